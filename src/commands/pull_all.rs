use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::branches::{
    find_fallback_branch, find_stale_branches, is_missing_upstream, parse_local_branches,
};
use crate::git::Git;
use crate::outcome::{format_summary_human, RepoOutcome, Summary};
use crate::parallel::run_per_repo;
use crate::progress::Progress;
use crate::prompt::Confirm;
use crate::repos::{has_submodules, repo_name};

#[derive(Debug, Clone, Copy, Default)]
pub struct PullOptions {
    /// Delete gone branches without asking.
    pub auto_confirm: bool,
    /// Report every mutating step instead of running it.
    pub dry_run: bool,
}

/// Read-only inputs shared by every repository's worker.
pub struct PullContext<'a> {
    pub git: &'a dyn Git,
    pub prompt: &'a dyn Confirm,
    pub options: PullOptions,
    pub remote: &'a str,
    pub fallback_branches: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct PullResult {
    pub dry_run: bool,
    #[serde(flatten)]
    pub summary: Summary,
}

pub fn cmd_pull_all(ctx: &PullContext, repos: &[PathBuf]) -> PullResult {
    if !repos.is_empty() {
        eprintln!(
            "→ Pulling {} repositories{}...",
            repos.len(),
            if ctx.options.dry_run { " (DRY-RUN)" } else { "" }
        );
    }

    let outcomes = run_per_repo(repos, |repo| pull_repo(ctx, repo));

    PullResult {
        dry_run: ctx.options.dry_run,
        summary: Summary::from_outcomes(outcomes),
    }
}

pub fn format_pull_human(result: &PullResult) -> String {
    format_summary_human(&result.summary)
}

/// Brings one repository up to date. Never fails: any step error ends this
/// repository's run and becomes a failed outcome. Completed steps are not
/// rolled back.
pub fn pull_repo(ctx: &PullContext, repo: &Path) -> RepoOutcome {
    let progress = Progress::new(repo_name(repo));
    let mut warnings = Vec::new();

    match sync_repo(ctx, repo, &progress, &mut warnings) {
        Ok(()) if ctx.options.dry_run => {
            progress.succeed("[DRY-RUN] Completed successfully");
            RepoOutcome::succeeded(repo, "Dry-run completed").with_warnings(warnings)
        }
        Ok(()) => {
            progress.succeed("Completed successfully");
            RepoOutcome::succeeded(repo, "Pull completed successfully").with_warnings(warnings)
        }
        Err(e) => {
            progress.fail();
            RepoOutcome::failed(repo, format!("{:#}", e)).with_warnings(warnings)
        }
    }
}

fn sync_repo(
    ctx: &PullContext,
    repo: &Path,
    progress: &Progress,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let dry_run = ctx.options.dry_run;

    progress.step("Getting current branch");
    let original = current_branch(ctx.git, repo)?;

    if dry_run {
        progress.planned("Would fetch from remote");
    } else {
        progress.step("Fetching from remote");
        ctx.git.run_or_fail(repo, &["fetch", "--all", "--prune"])?;
    }

    progress.step("Checking for gone branches");
    let stale = find_stale_branches(ctx.git, repo);
    if !stale.is_empty() {
        remove_stale_branches(ctx, repo, progress, &original, stale.into_iter().collect())?;
    }

    progress.step("Getting local branches");
    let listing = ctx.git.run_or_fail(repo, &["branch", "-l"])?;
    let local = parse_local_branches(&listing);

    if dry_run {
        progress.planned(&format!("Would update {} branches", local.len()));
    } else {
        for branch in &local {
            update_branch(ctx, repo, progress, branch, warnings);
        }
    }

    restore_branch(ctx, repo, progress, &original)?;

    if has_submodules(repo) {
        if dry_run {
            progress.planned("Would update submodules");
        } else {
            progress.step("Updating submodules");
            ctx.git
                .run_or_fail(repo, &["submodule", "update", "--init", "--recursive"])?;
        }
    }

    Ok(())
}

fn current_branch(git: &dyn Git, repo: &Path) -> Result<String> {
    let head = git.run_or_fail(repo, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(head.trim().to_string())
}

/// Moves off the checked-out branch if it is gone, then deletes the gone
/// branches once authorized. The checked-out branch is never deleted.
fn remove_stale_branches(
    ctx: &PullContext,
    repo: &Path,
    progress: &Progress,
    original: &str,
    mut to_delete: Vec<String>,
) -> Result<()> {
    let dry_run = ctx.options.dry_run;

    if to_delete.iter().any(|b| b == original) {
        match find_fallback_branch(ctx.git, repo, ctx.fallback_branches, original) {
            Some(fallback) if dry_run => {
                progress.planned(&format!("Would switch to {}", fallback));
            }
            Some(fallback) => {
                progress.step(&format!("Switching to {}", fallback));
                ctx.git.run_or_fail(repo, &["checkout", &fallback])?;
            }
            None => {
                progress.step(&format!(
                    "No fallback branch, keeping checked-out {}",
                    original
                ));
                to_delete.retain(|b| b != original);
            }
        }
    }

    if to_delete.is_empty() {
        return Ok(());
    }

    let branch_list = to_delete.join(", ");
    let authorized = ctx.options.auto_confirm
        || dry_run
        || ctx.prompt.confirm(&format!(
            "{}: Delete gone branches: {}?",
            progress.name(),
            branch_list
        ));
    if !authorized {
        progress.step(&format!("Keeping gone branches {}", branch_list));
        return Ok(());
    }

    for branch in &to_delete {
        if dry_run {
            progress.planned(&format!("Would delete gone branch {}", branch));
        } else {
            progress.step(&format!("Deleting gone branch {}", branch));
            ctx.git.run_or_fail(repo, &["branch", "-D", branch])?;
        }
    }
    Ok(())
}

/// Rebases `branch` onto its same-named remote ref. Failure never aborts the
/// repository; only failures other than a missing upstream are reported.
fn update_branch(
    ctx: &PullContext,
    repo: &Path,
    progress: &Progress,
    branch: &str,
    warnings: &mut Vec<String>,
) {
    progress.step(&format!("Updating branch {}", branch));
    let upstream = format!("{}/{}", ctx.remote, branch);
    let result = ctx
        .git
        .run(repo, &["rebase", "--autostash", &upstream, branch]);
    if result.success() || is_missing_upstream(&result.stderr) {
        return;
    }

    let warning = format!("failed to update {} in {}", branch, progress.name());
    progress.warn(&warning);
    warnings.push(warning);

    // A stopped rebase would block the remaining branches and the restore step.
    let abort = ctx.git.run(repo, &["rebase", "--abort"]);
    if !abort.success() {
        warn!(
            repo = %progress.name(),
            branch,
            exit_code = abort.exit_code,
            stderr = %abort.stderr.trim(),
            "rebase --abort failed"
        );
    }
}

/// Switches back to the branch checked out before the pull, if it still exists.
fn restore_branch(
    ctx: &PullContext,
    repo: &Path,
    progress: &Progress,
    original: &str,
) -> Result<()> {
    let current = current_branch(ctx.git, repo)?;
    if current == original {
        return Ok(());
    }

    let exists = ctx.git.run(repo, &["rev-parse", "--verify", original]).success();
    if !exists {
        return Ok(());
    }

    if ctx.options.dry_run {
        progress.planned(&format!("Would switch back to {}", original));
    } else {
        progress.step(&format!("Switching back to {}", original));
        ctx.git.run_or_fail(repo, &["checkout", original])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branches::DEFAULT_FALLBACK_BRANCHES;
    use crate::git::{CommandResult, SystemGit};
    use crate::testutil::{failed, ok, run_git, FakeGit, FakePrompt, TestEnv};

    const TRACKING: &str = "for-each-ref --format=%(refname:short)|%(upstream:track) refs/heads";

    fn fallbacks() -> Vec<String> {
        DEFAULT_FALLBACK_BRANCHES
            .iter()
            .map(|b| b.to_string())
            .collect()
    }

    fn context<'a>(
        git: &'a dyn Git,
        prompt: &'a dyn Confirm,
        options: PullOptions,
        fallback_branches: &'a [String],
    ) -> PullContext<'a> {
        PullContext {
            git,
            prompt,
            options,
            remote: "origin",
            fallback_branches,
        }
    }

    fn is_mutating(call: &str) -> bool {
        call.starts_with("checkout")
            || call.starts_with("branch -D")
            || call.starts_with("rebase")
            || call.starts_with("submodule")
            || call.starts_with("fetch")
    }

    #[test]
    fn gone_current_branch_switches_to_main_then_deletes() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["main", "feature-x"], "feature-x");
        git.respond(TRACKING, ok("main|\nfeature-x|[gone]\n"));
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.message, "Pull completed successfully");
        assert_eq!(
            git.calls(),
            vec![
                "rev-parse --abbrev-ref HEAD",
                "fetch --all --prune",
                "branch -vv",
                TRACKING,
                "branch -l",
                "checkout main",
                "branch -D feature-x",
                "branch -l",
                "rebase --autostash origin/main main",
                "rev-parse --abbrev-ref HEAD",
                "rev-parse --verify feature-x",
            ]
        );
        assert_eq!(prompt.asked().len(), 1);
        assert!(prompt.asked()[0].contains("Delete gone branches: feature-x?"));
        assert_eq!(git.head(), "main");
        assert_eq!(git.branches(), vec!["main"]);
    }

    #[test]
    fn dry_run_issues_no_mutating_commands() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join(".gitmodules"), "").unwrap();
        let git = FakeGit::new(&["main", "feature-x", "topic"], "feature-x");
        git.respond(TRACKING, ok("main|\nfeature-x|[gone]\ntopic|\n"));
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let options = PullOptions {
            auto_confirm: false,
            dry_run: true,
        };
        let ctx = context(&git, &prompt, options, &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.message, "Dry-run completed");
        let mutating: Vec<String> = git.calls().into_iter().filter(|c| is_mutating(c)).collect();
        assert!(mutating.is_empty(), "unexpected commands: {:?}", mutating);
        assert!(prompt.asked().is_empty());
        assert_eq!(git.branches(), vec!["main", "feature-x", "topic"]);
        assert_eq!(git.head(), "feature-x");
    }

    #[test]
    fn gone_current_branch_without_fallback_is_kept() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["feature-x", "old-fix"], "feature-x");
        git.respond(TRACKING, ok("feature-x|[gone]\nold-fix|[gone]\n"));
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let options = PullOptions {
            auto_confirm: true,
            dry_run: false,
        };
        let ctx = context(&git, &prompt, options, &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success, "{}", outcome.message);
        let calls = git.calls();
        assert!(calls.contains(&"branch -D old-fix".to_string()));
        assert!(!calls.contains(&"branch -D feature-x".to_string()));
        assert!(!calls.iter().any(|c| c == "checkout main"));
        assert_eq!(git.branches(), vec!["feature-x"]);
    }

    #[test]
    fn only_gone_branch_is_current_without_fallback_skips_prompt() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["feature-x"], "feature-x");
        git.respond(TRACKING, ok("feature-x|[gone]\n"));
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success);
        assert!(prompt.asked().is_empty());
        assert!(!git.calls().iter().any(|c| c.starts_with("branch -D")));
    }

    #[test]
    fn auto_confirm_deletes_without_prompting() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["main", "a", "b"], "main");
        git.respond(TRACKING, ok("main|\na|[gone]\nb|[gone]\n"));
        let prompt = FakePrompt::answering(false);
        let fallbacks = fallbacks();
        let options = PullOptions {
            auto_confirm: true,
            dry_run: false,
        };
        let ctx = context(&git, &prompt, options, &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success);
        assert!(prompt.asked().is_empty());
        assert_eq!(git.branches(), vec!["main"]);
    }

    #[test]
    fn declined_prompt_keeps_gone_branches() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["main", "a"], "main");
        git.respond(TRACKING, ok("main|\na|[gone]\n"));
        let prompt = FakePrompt::answering(false);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success);
        assert_eq!(prompt.asked().len(), 1);
        assert_eq!(git.branches(), vec!["main", "a"]);
    }

    #[test]
    fn one_prompt_names_every_gone_branch() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["main", "a", "b"], "main");
        git.respond(TRACKING, ok("main|\na|[gone]\nb|[gone]\n"));
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success, "{}", outcome.message);
        let name = repo_name(repo.path());
        assert_eq!(
            prompt.asked(),
            vec![format!("{}: Delete gone branches: a, b?", name)]
        );
        let calls = git.calls();
        assert!(calls.contains(&"branch -D a".to_string()));
        assert!(calls.contains(&"branch -D b".to_string()));
        assert_eq!(git.branches(), vec!["main"]);
    }

    #[test]
    fn failed_rebase_abort_does_not_fail_the_repo() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["main", "topic"], "main");
        git.respond(
            "rebase --autostash origin/topic topic",
            failed("CONFLICT (content): Merge conflict in a.txt"),
        );
        git.respond("rebase --abort", failed("fatal: No rebase in progress?"));
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(git.calls().contains(&"rebase --abort".to_string()));
    }

    #[test]
    fn gone_main_falls_back_to_master() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["main", "master"], "main");
        git.respond(TRACKING, ok("main|[gone]\nmaster|\n"));
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success, "{}", outcome.message);
        let calls = git.calls();
        let checkout = calls.iter().position(|c| c == "checkout master").unwrap();
        let delete = calls.iter().position(|c| c == "branch -D main").unwrap();
        assert!(checkout < delete);
        assert_eq!(git.branches(), vec!["master"]);
    }

    #[test]
    fn rebase_without_upstream_is_silent() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["main", "local-only"], "main");
        git.respond(
            "rebase --autostash origin/local-only local-only",
            failed("There is no tracking information for the current branch."),
        );
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success);
        assert!(outcome.warnings.is_empty());
        assert!(!git.calls().contains(&"rebase --abort".to_string()));
    }

    #[test]
    fn rebase_conflict_warns_but_repo_succeeds() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["main", "topic"], "main");
        git.respond(
            "rebase --autostash origin/topic topic",
            failed("CONFLICT (content): Merge conflict in a.txt"),
        );
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.message, "Pull completed successfully");
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("topic"));
        let calls = git.calls();
        let failed_at = calls
            .iter()
            .position(|c| c == "rebase --autostash origin/topic topic")
            .unwrap();
        assert_eq!(calls[failed_at + 1], "rebase --abort");
    }

    #[test]
    fn restores_original_branch_after_rebasing_others() {
        let repo = tempfile::tempdir().unwrap();
        // Listed order puts main last, so rebasing leaves HEAD on main.
        let git = FakeGit::new(&["topic", "main"], "topic");
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success, "{}", outcome.message);
        let calls = git.calls();
        assert!(calls.contains(&"rev-parse --verify topic".to_string()));
        assert_eq!(calls.last().map(String::as_str), Some("checkout topic"));
        assert_eq!(git.head(), "topic");
    }

    #[test]
    fn deleted_original_branch_is_not_restored() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["main", "feature-x"], "feature-x");
        git.respond(TRACKING, ok("feature-x|[gone]\n"));
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success);
        assert!(!git.calls().contains(&"checkout feature-x".to_string()));
    }

    #[test]
    fn submodules_are_updated_when_configured() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join(".gitmodules"), "").unwrap();
        let git = FakeGit::new(&["main"], "main");
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(outcome.success);
        assert_eq!(
            git.calls().last().map(String::as_str),
            Some("submodule update --init --recursive")
        );
    }

    #[test]
    fn fetch_failure_stops_the_repo() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["main"], "main");
        git.respond(
            "fetch --all --prune",
            failed("fatal: unable to access 'https://example.com/repo.git/'\n"),
        );
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(!outcome.success);
        assert_eq!(
            outcome.message,
            "fatal: unable to access 'https://example.com/repo.git/'"
        );
        assert_eq!(git.calls().len(), 2);
    }

    #[test]
    fn failure_without_stderr_reports_exit_code() {
        let repo = tempfile::tempdir().unwrap();
        let git = FakeGit::new(&["main"], "main");
        git.respond(
            "rev-parse --abbrev-ref HEAD",
            CommandResult {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 128,
            },
        );
        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let ctx = context(&git, &prompt, PullOptions::default(), &fallbacks);

        let outcome = pull_repo(&ctx, repo.path());

        assert!(!outcome.success);
        assert_eq!(
            outcome.message,
            "git rev-parse --abbrev-ref HEAD failed with exit code 128"
        );
    }

    #[test]
    fn cmd_pull_all_gives_one_outcome_per_repo_in_order() {
        let env = TestEnv::new();
        let api = env.create_repo_with_origin("api");
        let vanished = env.repo_path("vanished");
        let web = env.create_repo_with_origin("web");
        let repos = vec![api.clone(), vanished.clone(), web.clone()];

        let prompt = FakePrompt::answering(false);
        let fallbacks = fallbacks();
        let options = PullOptions {
            auto_confirm: true,
            dry_run: false,
        };
        let ctx = context(&SystemGit, &prompt, options, &fallbacks);

        let result = cmd_pull_all(&ctx, &repos);

        let paths: Vec<&PathBuf> = result.summary.outcomes.iter().map(|o| &o.path).collect();
        assert_eq!(paths, vec![&api, &vanished, &web]);
        assert!(result.summary.outcomes[0].success);
        assert!(!result.summary.outcomes[1].success);
        assert!(result.summary.outcomes[2].success);
        assert_eq!(result.summary.succeeded, 2);
        assert_eq!(result.summary.failed, 1);
    }

    #[test]
    fn real_repo_gone_current_branch_is_cleaned_up() {
        let env = TestEnv::new();
        let repo = env.create_repo_with_origin("api");
        env.push_branch(&repo, "feature-x");
        env.delete_remote_branch("api", "feature-x");

        let prompt = FakePrompt::answering(false);
        let fallbacks = fallbacks();
        let options = PullOptions {
            auto_confirm: true,
            dry_run: false,
        };
        let ctx = context(&SystemGit, &prompt, options, &fallbacks);

        let outcome = pull_repo(&ctx, &repo);

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(
            run_git(&repo, &["rev-parse", "--abbrev-ref", "HEAD"]),
            "main"
        );
        assert_eq!(
            run_git(&repo, &["branch", "--format=%(refname:short)"]),
            "main"
        );
    }

    #[test]
    fn real_repo_dry_run_leaves_branches_alone() {
        let env = TestEnv::new();
        let repo = env.create_repo_with_origin("api");
        env.push_branch(&repo, "feature-x");
        env.delete_remote_branch("api", "feature-x");
        run_git(&repo, &["fetch", "--prune"]);

        let prompt = FakePrompt::answering(true);
        let fallbacks = fallbacks();
        let options = PullOptions {
            auto_confirm: false,
            dry_run: true,
        };
        let ctx = context(&SystemGit, &prompt, options, &fallbacks);

        let outcome = pull_repo(&ctx, &repo);

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(
            run_git(&repo, &["rev-parse", "--abbrev-ref", "HEAD"]),
            "feature-x"
        );
        let branches = run_git(&repo, &["branch", "--format=%(refname:short)"]);
        assert!(branches.contains("feature-x"));
        assert!(prompt.asked().is_empty());
    }
}
