//! Local branch state, read from git's porcelain output.
//!
//! All text matching against git output lives here so the pull orchestration
//! only deals in branch names.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::debug;

use crate::git::Git;

pub const DEFAULT_FALLBACK_BRANCHES: &[&str] = &["develop", "main", "master"];

const GONE_MARKER: &str = "[gone]";
const FOR_EACH_REF_FORMAT: &str = "--format=%(refname:short)|%(upstream:track)";
/// Rebase failures that mean the branch has nothing to rebase onto. Git reports
/// a missing `<remote>/<branch>` ref as `fatal: invalid upstream '<ref>'`.
const MISSING_UPSTREAM_MARKERS: &[&str] =
    &["no tracking information", "no such ref", "invalid upstream"];

/// Strips the `*` (current) or `+` (other worktree) marker and whitespace from
/// one line of `git branch` output.
fn strip_branch_marker(line: &str) -> &str {
    let line = line.trim();
    line.strip_prefix(['*', '+']).unwrap_or(line).trim_start()
}

/// Branch names from `git branch -l`, in listed order.
pub fn parse_branch_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(strip_branch_marker)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Like `parse_branch_list`, without detached-HEAD placeholders such as
/// `(HEAD detached at 1a2b3c)`.
pub fn parse_local_branches(output: &str) -> Vec<String> {
    parse_branch_list(output)
        .into_iter()
        .filter(|name| !name.starts_with('('))
        .collect()
}

/// Branches whose `git branch -vv` line carries the literal `[gone]` marker.
pub fn parse_gone_from_branch_vv(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.contains(GONE_MARKER))
        .filter_map(|line| strip_branch_marker(line).split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Branches whose `<branch>|<upstream:track>` line reports the upstream gone.
pub fn parse_gone_from_tracking(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_once('|'))
        .filter(|(_, track)| track.contains("gone"))
        .map(|(name, _)| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether a failed rebase's stderr only says the branch has nothing upstream
/// to rebase onto.
pub fn is_missing_upstream(stderr: &str) -> bool {
    MISSING_UPSTREAM_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker))
}

/// Union of both detections. Each source is queried independently; a failing
/// query contributes nothing instead of aborting the other.
pub fn find_stale_branches(git: &dyn Git, repo: &Path) -> BTreeSet<String> {
    let mut stale = BTreeSet::new();

    let verbose = git.run(repo, &["branch", "-vv"]);
    if verbose.success() {
        stale.extend(parse_gone_from_branch_vv(&verbose.stdout));
    } else {
        debug!(repo = %repo.display(), stderr = %verbose.stderr.trim(), "branch -vv failed");
    }

    let tracking = git.run(repo, &["for-each-ref", FOR_EACH_REF_FORMAT, "refs/heads"]);
    if tracking.success() {
        stale.extend(parse_gone_from_tracking(&tracking.stdout));
    } else {
        debug!(repo = %repo.display(), stderr = %tracking.stderr.trim(), "for-each-ref failed");
    }

    stale
}

/// First of `candidates` that exists locally, skipping `exclude` (the branch
/// being moved away from). `None` when listing fails or nothing matches.
pub fn find_fallback_branch(
    git: &dyn Git,
    repo: &Path,
    candidates: &[String],
    exclude: &str,
) -> Option<String> {
    let listing = git.run(repo, &["branch", "-l"]);
    if !listing.success() {
        return None;
    }
    let local = parse_branch_list(&listing.stdout);
    candidates
        .iter()
        .filter(|candidate| candidate.as_str() != exclude)
        .find(|candidate| local.contains(*candidate))
        .cloned()
}
