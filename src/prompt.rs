use std::io::{BufRead, Write};
use std::sync::Mutex;

/// A single yes/no question to the operator.
pub trait Confirm: Sync {
    fn confirm(&self, message: &str) -> bool;
}

/// Asks on stderr and reads the answer from stdin. Concurrent callers are
/// serialized so only one question is on the terminal at a time.
#[derive(Default)]
pub struct StdinPrompt {
    lock: Mutex<()>,
}

impl Confirm for StdinPrompt {
    fn confirm(&self, message: &str) -> bool {
        // A poisoned lock only means another prompt panicked; the terminal is still usable.
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut stderr = std::io::stderr().lock();
        if write!(stderr, "{} [y/N] ", message).is_err() || stderr.flush().is_err() {
            return false;
        }

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => false,
            Ok(_) => parse_answer(&line),
        }
    }
}

/// Empty or unrecognized input declines.
pub fn parse_answer(input: &str) -> bool {
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
