//! Git history queries
//!
//! Drives the `git` binary as a subprocess: per-commit file changes with
//! exact changed lines, historical file content, and shallow-clone
//! detection. Read-only; never touches the index or the checkout.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use thiserror::Error;

use crate::diff_parse::{join_changes, parse_name_status, parse_zero_context_diff, FileChange};

/// Hash of git's empty tree, the diff base for a root commit
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository: {}", .0.display())]
    InvalidRepository(PathBuf),
    #[error("Invalid revision: '{0}'")]
    InvalidRevision(String),
    #[error(
        "Parent of {commit} is not available because the repository is a shallow clone. \
         Fetch full history (`git fetch --unshallow`, or `fetch-depth: 0` in CI) and retry"
    )]
    ShallowHistory { commit: String },
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("Failed to run git: {0}. Is git installed?")]
    Io(#[from] std::io::Error),
}

/// Read access to file content at arbitrary revisions.
///
/// The resolver consumes history only through this trait, so it can be
/// backed by an in-memory map in tests.
pub trait RevisionSource: Send + Sync {
    /// Content of `path` (repository-relative, `/`-separated) at `revision`.
    ///
    /// Returns `Ok(None)` if the path did not exist at that revision.
    fn file_content_at(&self, revision: &str, path: &str) -> Result<Option<String>, GitError>;
}

/// A git work tree
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Open the repository containing `path`.
    ///
    /// Fails with [`GitError::InvalidRepository`] if `path` does not exist or
    /// is not inside a git work tree.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let _span = tracing::info_span!("git_open", path = %path.display()).entered();

        if !path.is_dir() {
            return Err(GitError::InvalidRepository(path.to_path_buf()));
        }
        let output = git_command(path)
            .args(["rev-parse", "--show-toplevel"])
            .output()?;
        if !output.status.success() {
            tracing::debug!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "rev-parse --show-toplevel failed"
            );
            return Err(GitError::InvalidRepository(path.to_path_buf()));
        }

        let toplevel = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let root = dunce::canonicalize(&toplevel).unwrap_or_else(|_| PathBuf::from(toplevel));
        Ok(Self { root })
    }

    /// Top-level directory of the work tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a revision expression to a full commit hash
    pub fn resolve(&self, rev: &str) -> Result<String, GitError> {
        check_revision(rev)?;
        let spec = format!("{}^{{commit}}", rev);
        let output = self.run(&["rev-parse", "--verify", "--quiet", &spec])?;
        if !output.status.success() {
            return Err(GitError::InvalidRevision(rev.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Whether history was fetched with limited depth
    pub fn is_shallow(&self) -> Result<bool, GitError> {
        Ok(!self.shallow_boundary()?.is_empty())
    }

    /// First parent of `commit`.
    ///
    /// `Ok(None)` for a root commit. A commit at the boundary of a shallow
    /// clone looks parentless too, so that case is told apart through the
    /// shallow file and reported as [`GitError::ShallowHistory`].
    pub fn parent_of(&self, commit: &str) -> Result<Option<String>, GitError> {
        let _span = tracing::info_span!("parent_of", commit).entered();

        let sha = self.resolve(commit)?;
        let boundary = self.shallow_boundary()?;
        if boundary.contains(&sha) {
            return Err(GitError::ShallowHistory { commit: sha });
        }

        let listing = self.run_ok(&["rev-list", "--parents", "-n", "1", &sha])?;
        let Some(parent) = listing.split_whitespace().nth(1).map(str::to_string) else {
            tracing::debug!(commit = %sha, "Root commit, no parent");
            return Ok(None);
        };

        if !boundary.is_empty() {
            let spec = format!("{}^{{commit}}", parent);
            let present = self.run(&["cat-file", "-e", &spec])?.status.success();
            if !present {
                return Err(GitError::ShallowHistory { commit: sha });
            }
        }
        Ok(Some(parent))
    }

    /// Files changed by `commit` relative to its first parent.
    ///
    /// A root commit is diffed against the empty tree, so every file it
    /// introduces is ADDED with all of its lines.
    pub fn changed_files(&self, commit: &str) -> Result<Vec<FileChange>, GitError> {
        let _span = tracing::info_span!("changed_files", commit).entered();

        let sha = self.resolve(commit)?;
        let parent = self.parent_of(&sha)?;
        self.changed_files_since(parent.as_deref(), &sha)
    }

    /// Files changed between an explicit `base` and `commit`
    pub fn changed_files_between(
        &self,
        base: &str,
        commit: &str,
    ) -> Result<Vec<FileChange>, GitError> {
        let _span = tracing::info_span!("changed_files_between", base, commit).entered();

        let base = self.resolve(base)?;
        let sha = self.resolve(commit)?;
        self.diff(&base, &sha)
    }

    /// Files changed from already-resolved `base` to `sha`.
    ///
    /// `None` stands for the empty tree (root commit). No revision is
    /// resolved again, so callers that already hold the parent skip the
    /// repeated `rev-parse`/`rev-list` round trips.
    pub fn changed_files_since(
        &self,
        base: Option<&str>,
        sha: &str,
    ) -> Result<Vec<FileChange>, GitError> {
        check_revision(sha)?;
        let base = base.unwrap_or(EMPTY_TREE);
        check_revision(base)?;
        self.diff(base, sha)
    }

    fn diff(&self, base: &str, target: &str) -> Result<Vec<FileChange>, GitError> {
        let name_status = self.run_ok(&[
            "diff",
            "--no-ext-diff",
            "--no-color",
            "-M",
            "--name-status",
            base,
            target,
        ])?;
        let patch = self.run_ok(&[
            "diff",
            "--no-ext-diff",
            "--no-color",
            "--no-textconv",
            "-M",
            "--unified=0",
            "--src-prefix=a/",
            "--dst-prefix=b/",
            base,
            target,
        ])?;

        let changes = join_changes(
            parse_name_status(&name_status),
            parse_zero_context_diff(&patch),
        );
        tracing::info!(files = changes.len(), "Collected changed files");
        Ok(changes)
    }

    /// Commits listed in `$GIT_DIR/shallow`; empty for a complete clone
    fn shallow_boundary(&self) -> Result<HashSet<String>, GitError> {
        let git_path = self.run_ok(&["rev-parse", "--git-path", "shallow"])?;
        let git_path = PathBuf::from(git_path.trim());
        let shallow_file = if git_path.is_absolute() {
            git_path
        } else {
            self.root.join(git_path)
        };

        match std::fs::read_to_string(&shallow_file) {
            Ok(content) => Ok(content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
            Err(e) => Err(GitError::Io(e)),
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output, GitError> {
        Ok(git_command(&self.root).args(args).output()?)
    }

    /// Run and return stdout, mapping a non-zero exit to `CommandFailed`
    fn run_ok(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl RevisionSource for GitRepo {
    fn file_content_at(&self, revision: &str, path: &str) -> Result<Option<String>, GitError> {
        check_revision(revision)?;
        let object = format!("{}:{}", revision, path.trim_start_matches("./"));
        let output = self.run(&["cat-file", "blob", &object])?;
        if output.status.success() {
            return Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()));
        }
        // Tell "path absent at a valid revision" apart from a bad revision
        self.resolve(revision)?;
        tracing::debug!(revision, path, "Path does not exist at revision");
        Ok(None)
    }
}

fn git_command(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.args(["--no-pager", "-c", "core.quotepath=off"])
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

/// Reject revisions git would read as options
fn check_revision(rev: &str) -> Result<(), GitError> {
    if rev.is_empty() || rev.starts_with('-') || rev.contains('\0') {
        return Err(GitError::InvalidRevision(rev.to_string()));
    }
    Ok(())
}
