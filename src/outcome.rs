use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::repos::repo_name;

const UNKNOWN_ERROR: &str = "unknown error";
const RULE_WIDTH: usize = 60;

/// Terminal result of one repository in a bulk command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoOutcome {
    pub path: PathBuf,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RepoOutcome {
    pub fn succeeded(path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            success: true,
            message: message.into(),
            warnings: Vec::new(),
        }
    }

    /// Blank messages become "unknown error".
    pub fn failed(path: &Path, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            message
        };
        Self {
            path: path.to_path_buf(),
            success: false,
            message,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Outcomes of one bulk command plus their success/failure counts.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub outcomes: Vec<RepoOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

impl Summary {
    pub fn from_outcomes(outcomes: Vec<RepoOutcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let failed = outcomes.len() - succeeded;
        Self {
            outcomes,
            succeeded,
            failed,
        }
    }
}

pub fn format_summary_human(summary: &Summary) -> String {
    let rule = "─".repeat(RULE_WIDTH);
    let mut lines = vec![String::new(), "Results:".to_string(), rule.clone()];

    for outcome in &summary.outcomes {
        let mark = if outcome.success { "✓" } else { "✗" };
        lines.push(format!(
            "{} {} - {}",
            mark,
            repo_name(&outcome.path),
            outcome.message
        ));
        for warning in &outcome.warnings {
            lines.push(format!("    warning: {}", warning));
        }
    }

    lines.push(rule);
    lines.push(String::new());
    lines.push(format!(
        "Summary: {} succeeded, {} failed",
        summary.succeeded, summary.failed
    ));
    lines.join("\n")
}
