use serde::Serialize;
use std::path::PathBuf;

use crate::git::Git;
use crate::repos::{has_submodules, repo_name};

#[derive(Debug, Serialize)]
pub struct SubmoduleListResult {
    pub repos: Vec<SubmoduleRepo>,
}

#[derive(Debug, Serialize)]
pub struct SubmoduleRepo {
    pub name: String,
    pub path: PathBuf,
    /// Lines of `git submodule` status output.
    pub submodules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn cmd_submodule_list(git: &dyn Git, repos: &[PathBuf]) -> SubmoduleListResult {
    let repos = repos
        .iter()
        .filter(|repo| has_submodules(repo))
        .map(|repo| {
            let result = git.run(repo, &["submodule"]);
            let (submodules, error) = if result.success() {
                let lines = result
                    .stdout
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| line.trim_end().to_string())
                    .collect();
                (lines, None)
            } else {
                let stderr = result.stderr.trim();
                let error = if stderr.is_empty() {
                    format!("git submodule failed with exit code {}", result.exit_code)
                } else {
                    stderr.to_string()
                };
                (Vec::new(), Some(error))
            };

            SubmoduleRepo {
                name: repo_name(repo),
                path: repo.clone(),
                submodules,
                error,
            }
        })
        .collect();

    SubmoduleListResult { repos }
}

pub fn format_submodule_list_human(result: &SubmoduleListResult) -> String {
    let mut lines = vec![
        String::new(),
        "✓ Repositories with submodules:".to_string(),
        String::new(),
    ];

    if result.repos.is_empty() {
        lines.push("  No repositories with submodules found".to_string());
        return lines.join("\n");
    }

    for repo in &result.repos {
        lines.push(format!("  {}", repo.name));
        for submodule in &repo.submodules {
            lines.push(format!("    {}", submodule));
        }
        if let Some(error) = &repo.error {
            lines.push(format!("    Error: {}", error));
        }
    }
    lines.join("\n")
}
