use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SUBMODULE_CONFIG: &str = ".gitmodules";

/// Working copies beneath `base`: every directory holding a `.git`
/// directory. Directories named in `exclude` are not descended into and
/// symbolic links are not followed. Sorted lexicographically.
pub fn discover_repositories(base: &Path, exclude: &[String]) -> Result<Vec<PathBuf>> {
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let mut repos = Vec::new();
    let mut entries = WalkDir::new(base)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            let excluded = entry.depth() > 0
                && entry.file_type().is_dir()
                && exclude
                    .iter()
                    .any(|ex| entry.file_name().to_string_lossy() == ex.as_str());
            !excluded
        });

    while let Some(entry) = entries.next() {
        let entry = match entry {
            Ok(entry) => entry,
            // Unreadable subtrees are skipped; only the base itself must be readable.
            Err(e) if e.depth() > 0 => continue,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read directory {}", base.display()))
            }
        };

        if entry.file_type().is_dir() && entry.file_name() == ".git" {
            if let Some(parent) = entry.path().parent() {
                repos.push(parent.to_path_buf());
            }
            entries.skip_current_dir();
        }
    }

    repos.sort();
    Ok(repos)
}

/// Display name of a repository: its final path segment.
pub fn repo_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => path.display().to_string(),
    }
}

pub fn has_submodules(repo: &Path) -> bool {
    repo.join(SUBMODULE_CONFIG).is_file()
}
