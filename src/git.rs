use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Captured outcome of one git invocation. A non-zero `exit_code` is data,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs git against a working copy. `run` never fails; `run_or_fail` turns a
/// non-zero exit into an error carrying stderr.
pub trait Git: Sync {
    fn run(&self, repo: &Path, args: &[&str]) -> CommandResult;

    fn run_or_fail(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let result = self.run(repo, args);
        if !result.success() {
            let stderr = result.stderr.trim();
            if stderr.is_empty() {
                bail!(
                    "git {} failed with exit code {}",
                    args.join(" "),
                    result.exit_code
                );
            }
            bail!("{}", stderr);
        }
        Ok(result.stdout.trim_end().to_string())
    }
}

/// The `git` binary on `PATH`.
pub struct SystemGit;

impl Git for SystemGit {
    fn run(&self, repo: &Path, args: &[&str]) -> CommandResult {
        let output = Command::new("git")
            .args(args)
            .current_dir(repo)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let result = match output {
            Ok(output) => CommandResult {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                // Killed by a signal: no code.
                exit_code: output.status.code().unwrap_or(1),
            },
            Err(e) => CommandResult {
                stdout: String::new(),
                stderr: format!("failed to run git {:?} in {}: {}", args, repo.display(), e),
                exit_code: 1,
            },
        };

        debug!(
            repo = %repo.display(),
            args = ?args,
            exit_code = result.exit_code,
            "git finished"
        );
        result
    }
}
