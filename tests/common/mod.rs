//! Common test fixtures and helpers
//!
//! Usage in test files:
//! ```ignore
//! mod common;
//! use common::TestRepo;
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use tia::git::{GitError, RevisionSource};

/// Whether a usable `git` binary is on PATH
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Scratch git repository with automatic cleanup
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Initialize an empty repository, or `None` when git is unavailable
    pub fn new() -> Option<Self> {
        if !git_available() {
            eprintln!("git not available, skipping");
            return None;
        }
        let dir = TempDir::new().expect("Failed to create temp dir");
        let repo = Self { dir };
        repo.git(&["init", "-q"]);
        Some(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create dirs");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.dir.path().join(rel)).expect("Failed to remove file");
    }

    /// Stage everything and commit; returns the new HEAD hash
    pub fn commit(&self, message: &str) -> String {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "--allow-empty", "-m", message]);
        self.git(&["rev-parse", "HEAD"]).trim().to_string()
    }

    /// Run git in the repo, panicking on failure; returns stdout
    pub fn git(&self, args: &[&str]) -> String {
        run_git(self.dir.path(), args)
    }

    /// Clone this repo with `--depth 1` into a fresh temp dir
    pub fn shallow_clone(&self) -> TempDir {
        let dest = TempDir::new().expect("Failed to create temp dir");
        let url = format!("file://{}", self.dir.path().display());
        let target = dest.path().join("clone");
        let target = target.to_str().expect("utf8 path");
        run_git(dest.path(), &["clone", "-q", "--depth", "1", &url, target]);
        dest
    }
}

fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=tia",
            "-c",
            "user.email=tia@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "init.defaultBranch=main",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// In-memory history keyed by (revision, path)
#[derive(Default)]
pub struct MemoryHistory {
    files: HashMap<(String, String), String>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, revision: &str, path: &str, content: &str) -> Self {
        let key = (revision.to_string(), path.to_string());
        self.files.insert(key, content.to_string());
        self
    }
}

impl RevisionSource for MemoryHistory {
    fn file_content_at(&self, revision: &str, path: &str) -> Result<Option<String>, GitError> {
        let key = (revision.to_string(), path.to_string());
        Ok(self.files.get(&key).cloned())
    }
}

/// A root path that does not exist, for fully in-memory analyses
pub fn phantom_root() -> PathBuf {
    PathBuf::from("/nonexistent/tia-fixture")
}
