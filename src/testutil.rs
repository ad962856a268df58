#![cfg(test)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use tempfile::TempDir;

use crate::git::{CommandResult, Git};
use crate::prompt::Confirm;

pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("remotes")).unwrap();
        Self { dir }
    }

    pub fn src_dir(&self) -> PathBuf {
        self.dir.path().join("src")
    }

    pub fn repo_path(&self, name: &str) -> PathBuf {
        self.src_dir().join(name)
    }

    pub fn remote_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("remotes").join(format!("{}.git", name))
    }

    /// Standalone repository on `main` with one empty commit.
    pub fn create_repo(&self, name: &str) -> PathBuf {
        let repo_path = self.repo_path(name);
        std::fs::create_dir_all(&repo_path).unwrap();
        run_git(&repo_path, &["init", "-b", "main"]);
        run_git(&repo_path, &["commit", "--allow-empty", "-m", "initial"]);
        repo_path
    }

    /// Clone of a bare `origin` with `main` pushed and tracked.
    pub fn create_repo_with_origin(&self, name: &str) -> PathBuf {
        let remote = self.remote_path(name);
        std::fs::create_dir_all(&remote).unwrap();
        run_git(&remote, &["init", "--bare", "-b", "main"]);

        let repo_path = self.repo_path(name);
        let remote_str = remote.to_string_lossy().to_string();
        let repo_str = repo_path.to_string_lossy().to_string();
        run_git(&self.src_dir(), &["clone", &remote_str, &repo_str]);
        run_git(&repo_path, &["commit", "--allow-empty", "-m", "initial"]);
        run_git(&repo_path, &["branch", "-M", "main"]);
        run_git(&repo_path, &["push", "-u", "origin", "main"]);
        repo_path
    }

    /// Creates `branch` from the current HEAD, pushes it with upstream
    /// tracking, and leaves it checked out.
    pub fn push_branch(&self, repo: &Path, branch: &str) {
        run_git(repo, &["checkout", "-b", branch]);
        run_git(repo, &["push", "-u", "origin", branch]);
    }

    /// Deletes `branch` on the bare remote so the clone sees it as gone after
    /// the next pruning fetch.
    pub fn delete_remote_branch(&self, name: &str, branch: &str) {
        run_git(&self.remote_path(name), &["branch", "-D", branch]);
    }
}

/// Runs git with a fixed identity, panicking on failure.
pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@test.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@test.com")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn ok(stdout: &str) -> CommandResult {
    CommandResult {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: 0,
    }
}

pub fn failed(stderr: &str) -> CommandResult {
    CommandResult {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code: 1,
    }
}

// --- FakeGit ---

struct FakeState {
    head: String,
    branches: Vec<String>,
    responses: HashMap<String, CommandResult>,
    calls: Vec<String>,
}

/// In-memory git that records every invocation. Models HEAD and the local
/// branch list for checkout, branch -D, branch -l, rev-parse and rebase;
/// anything else succeeds with empty output unless scripted via `respond`.
/// The same fake serves every repository path.
pub struct FakeGit {
    state: Mutex<FakeState>,
}

impl FakeGit {
    pub fn new(branches: &[&str], head: &str) -> Self {
        Self {
            state: Mutex::new(FakeState {
                head: head.to_string(),
                branches: branches.iter().map(|b| b.to_string()).collect(),
                responses: HashMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Scripts the result for an exact space-joined argument list.
    pub fn respond(&self, args: &str, result: CommandResult) {
        let mut state = self.state.lock().unwrap();
        state.responses.insert(args.to_string(), result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn head(&self) -> String {
        self.state.lock().unwrap().head.clone()
    }

    pub fn branches(&self) -> Vec<String> {
        self.state.lock().unwrap().branches.clone()
    }
}

impl Git for FakeGit {
    fn run(&self, _repo: &Path, args: &[&str]) -> CommandResult {
        let mut state = self.state.lock().unwrap();
        let joined = args.join(" ");
        state.calls.push(joined.clone());

        if let Some(result) = state.responses.get(&joined) {
            return result.clone();
        }

        match args {
            ["rev-parse", "--abbrev-ref", "HEAD"] => ok(&format!("{}\n", state.head)),
            ["rev-parse", "--verify", branch] => {
                if state.branches.iter().any(|b| b == branch) {
                    ok("0123456789abcdef\n")
                } else {
                    failed("fatal: Needed a single revision")
                }
            }
            ["branch", "-l"] => {
                let listing: String = state
                    .branches
                    .iter()
                    .map(|b| {
                        let marker = if *b == state.head { "* " } else { "  " };
                        format!("{}{}\n", marker, b)
                    })
                    .collect();
                ok(&listing)
            }
            ["checkout", branch] => {
                if state.branches.iter().any(|b| b == branch) {
                    state.head = branch.to_string();
                    ok("")
                } else {
                    failed(&format!(
                        "error: pathspec '{}' did not match any file(s) known to git",
                        branch
                    ))
                }
            }
            ["branch", "-D", branch] => {
                if *branch == state.head {
                    failed(&format!(
                        "error: Cannot delete branch '{}' checked out",
                        branch
                    ))
                } else if let Some(pos) = state.branches.iter().position(|b| b == branch) {
                    state.branches.remove(pos);
                    ok("")
                } else {
                    failed(&format!("error: branch '{}' not found.", branch))
                }
            }
            ["rebase", "--autostash", _, branch] => {
                state.head = branch.to_string();
                ok("")
            }
            _ => ok(""),
        }
    }
}

// --- FakePrompt ---

pub struct FakePrompt {
    answer: bool,
    asked: Mutex<Vec<String>>,
}

impl FakePrompt {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl Confirm for FakePrompt {
    fn confirm(&self, message: &str) -> bool {
        self.asked.lock().unwrap().push(message.to_string());
        self.answer
    }
}
