use tracing::info;

/// Status handle owned by one repository's worker. Steps are `info!` events;
/// dry-run plans, warnings and the terminal marker are printed to stderr.
pub struct Progress {
    name: String,
}

impl Progress {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step(&self, text: &str) {
        info!(repo = %self.name, "{}", text);
    }

    /// A mutating action suppressed by dry-run.
    pub fn planned(&self, text: &str) {
        eprintln!("{}", self.planned_line(text));
    }

    fn planned_line(&self, text: &str) -> String {
        format!("[DRY-RUN] {}: {}", self.name, text)
    }

    pub fn warn(&self, text: &str) {
        eprintln!("warning: {}", text);
    }

    pub fn succeed(&self, text: &str) {
        eprintln!("✓ {} - {}", self.name, text);
    }

    pub fn fail(&self) {
        eprintln!("✗ {} - Failed", self.name);
    }
}
