use anyhow::{bail, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::git::Git;
use crate::outcome::{format_summary_human, RepoOutcome, Summary};
use crate::parallel::run_per_repo;
use crate::progress::Progress;
use crate::repos::repo_name;

#[derive(Debug, Serialize)]
pub struct ExecResult {
    pub command: String,
    #[serde(flatten)]
    pub summary: Summary,
}

/// Runs `git <args>` verbatim in every repository concurrently. The CLI
/// already requires at least one argument; direct callers get an error for an
/// empty list instead of a bare `git` invocation.
pub fn cmd_exec(git: &dyn Git, repos: &[PathBuf], args: &[String]) -> Result<ExecResult> {
    if args.is_empty() {
        bail!("no git command specified\n  hint: gbulk exec <git-args>...");
    }

    let command = format!("git {}", args.join(" "));
    if !repos.is_empty() {
        eprintln!("→ Running '{}' in {} repositories...", command, repos.len());
    }

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let outcomes = run_per_repo(repos, |repo| {
        let progress = Progress::new(repo_name(repo));
        progress.step(&command);
        let result = git.run(repo, &arg_refs);

        if result.success() {
            progress.succeed("Done");
            let stdout = result.stdout.trim();
            let message = if stdout.is_empty() {
                "completed successfully"
            } else {
                stdout
            };
            RepoOutcome::succeeded(repo, message)
        } else {
            progress.fail();
            let stderr = result.stderr.trim();
            let message = if stderr.is_empty() {
                format!("Command failed with exit code {}", result.exit_code)
            } else {
                stderr.to_string()
            };
            RepoOutcome::failed(repo, message)
        }
    });

    Ok(ExecResult {
        command,
        summary: Summary::from_outcomes(outcomes),
    })
}

pub fn format_exec_human(result: &ExecResult) -> String {
    format_summary_human(&result.summary)
}
