use std::path::{Path, PathBuf};
use std::thread;

use tracing::error;

use crate::outcome::RepoOutcome;

/// Runs `work` for every repository on its own thread and joins them all.
/// Outcomes come back in the order of `repos`, one per repository; a panicking
/// worker is reported as a failed outcome.
pub fn run_per_repo<F>(repos: &[PathBuf], work: F) -> Vec<RepoOutcome>
where
    F: Fn(&Path) -> RepoOutcome + Sync,
{
    let work = &work;
    thread::scope(|scope| {
        let handles: Vec<_> = repos
            .iter()
            .map(|repo| (repo, scope.spawn(move || work(repo.as_path()))))
            .collect();

        handles
            .into_iter()
            .map(|(repo, handle)| {
                handle.join().unwrap_or_else(|_| {
                    error!(repo = %repo.display(), "worker panicked");
                    RepoOutcome::failed(repo, "worker panicked")
                })
            })
            .collect()
    })
}
