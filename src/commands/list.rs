use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub repos: Vec<PathBuf>,
}

pub fn cmd_list(repos: &[PathBuf]) -> ListResult {
    ListResult {
        repos: repos.to_vec(),
    }
}

pub fn format_list_human(result: &ListResult) -> String {
    let mut lines = vec![
        String::new(),
        format!("✓ Found {} git repositories:", result.repos.len()),
        String::new(),
    ];
    for repo in &result.repos {
        lines.push(format!("  {}", repo.display()));
    }
    lines.join("\n")
}
