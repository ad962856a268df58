use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::git::{CommandResult, Git};
use crate::outcome::{format_summary_human, RepoOutcome, Summary};
use crate::parallel::run_per_repo;
use crate::progress::Progress;
use crate::repos::{has_submodules, repo_name};

#[derive(Debug, Serialize)]
pub struct SubmoduleUpdateResult {
    pub branch: String,
    #[serde(flatten)]
    pub summary: Summary,
}

/// In every repository with submodules, checks out `branch` in each submodule
/// and pull-rebases it.
pub fn cmd_submodule_update(
    git: &dyn Git,
    repos: &[PathBuf],
    branch: &str,
) -> SubmoduleUpdateResult {
    let qualifying: Vec<PathBuf> = repos
        .iter()
        .filter(|repo| has_submodules(repo))
        .cloned()
        .collect();

    if !qualifying.is_empty() {
        eprintln!(
            "→ Updating submodules in {} repositories...",
            qualifying.len()
        );
    }

    let outcomes = run_per_repo(&qualifying, |repo| update_submodules(git, repo, branch));

    SubmoduleUpdateResult {
        branch: branch.to_string(),
        summary: Summary::from_outcomes(outcomes),
    }
}

fn update_submodules(git: &dyn Git, repo: &Path, branch: &str) -> RepoOutcome {
    let progress = Progress::new(repo_name(repo));

    progress.step(&format!("Checking out {} in submodules", branch));
    let checkout = git.run(repo, &["submodule", "foreach", "git", "checkout", branch]);
    if !checkout.success() {
        progress.fail();
        return failure(
            repo,
            &checkout,
            format!("Failed to checkout {} in submodules", branch),
        );
    }

    progress.step("Pulling submodules");
    let pull = git.run(
        repo,
        &[
            "submodule",
            "foreach",
            "git",
            "pull",
            "--autostash",
            "--rebase",
            "--no-commit",
        ],
    );
    if !pull.success() {
        progress.fail();
        return failure(repo, &pull, "Failed to pull submodules".to_string());
    }

    progress.succeed("Submodules updated");
    RepoOutcome::succeeded(repo, "Submodules updated successfully")
}

fn failure(repo: &Path, result: &CommandResult, fallback: String) -> RepoOutcome {
    let stderr = result.stderr.trim();
    if stderr.is_empty() {
        RepoOutcome::failed(repo, fallback)
    } else {
        RepoOutcome::failed(repo, stderr)
    }
}

pub fn format_submodule_update_human(result: &SubmoduleUpdateResult) -> String {
    if result.summary.outcomes.is_empty() {
        return "No repositories with submodules found!".to_string();
    }
    format_summary_human(&result.summary)
}
