//! Whole-run orchestration
//!
//! Open repo, resolve the commit and its parent, collect changes, build the
//! import graph, resolve impact. Repository-level failures are terminal and
//! come back as [`AnalysisError`]; per-file failures are already absorbed
//! into the report's diagnostics.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use thiserror::Error;

use crate::config::Config;
use crate::git::{GitError, GitRepo};
use crate::graph::{normalize_path, GraphError, GraphOptions, ModuleGraph};
use crate::impact::{AnalysisReport, ImpactResolver};
use crate::parser::TestExtractor;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Index(#[from] GraphError),
    #[error("Analysis timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("Analysis worker failed: {0}")]
    Worker(String),
}

impl AnalysisError {
    /// What the user should do about it, when there is something to do
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            AnalysisError::Git(GitError::ShallowHistory { .. }) => Some(
                "Fetch full history: `git fetch --unshallow`, or set `fetch-depth: 0` on the CI checkout step",
            ),
            AnalysisError::Git(GitError::InvalidRepository(_)) | AnalysisError::Index(_) => {
                Some("Point --repo at a directory inside a git work tree")
            }
            AnalysisError::Git(GitError::InvalidRevision(_)) => {
                Some("Check that the --commit/--base revision exists in this clone")
            }
            AnalysisError::Git(GitError::Io(_)) => Some("Make sure `git` is installed and on PATH"),
            AnalysisError::Timeout(_) => Some("Raise --timeout or `timeout_secs` in .tia.toml"),
            AnalysisError::Git(GitError::CommandFailed { .. }) | AnalysisError::Worker(_) => None,
        }
    }
}

/// What to analyze
#[derive(Debug, Clone)]
pub struct SelectOptions {
    /// Any directory inside the repository
    pub repo: PathBuf,
    /// Revision whose changes are analyzed
    pub commit: String,
    /// Diff against this revision instead of the first parent
    pub base: Option<String>,
    /// Ignore history and select every test
    pub all: bool,
    /// Overrides the configured timeout
    pub timeout: Option<Duration>,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            repo: PathBuf::from("."),
            commit: "HEAD".to_string(),
            base: None,
            all: false,
            timeout: None,
        }
    }
}

/// Owned inputs so a run can move to a worker thread
struct RunSettings {
    extractor: TestExtractor,
    graph: GraphOptions,
}

/// Run one analysis, enforcing the timeout at whole-run granularity.
///
/// The run always happens on a worker thread, so a panic inside it surfaces
/// as [`AnalysisError::Worker`] instead of tearing down the caller. On
/// timeout the worker is abandoned; it holds no locks and writes nothing,
/// so the caller can exit immediately.
pub fn select_tests(
    options: &SelectOptions,
    config: &Config,
) -> Result<AnalysisReport, AnalysisError> {
    let _span = tracing::info_span!(
        "select_tests",
        repo = %options.repo.display(),
        commit = %options.commit,
        all = options.all
    )
    .entered();

    let settings = RunSettings {
        extractor: config.extractor(),
        graph: config.graph_options(),
    };
    let limit = options.timeout.or_else(|| config.timeout());
    let worker_options = options.clone();
    run_on_worker(limit, move || run(&worker_options, &settings))
}

/// Run `job` on a named thread and wait for it, at most `limit` if given
fn run_on_worker<F>(limit: Option<Duration>, job: F) -> Result<AnalysisReport, AnalysisError>
where
    F: FnOnce() -> Result<AnalysisReport, AnalysisError> + Send + 'static,
{
    let (tx, rx) = bounded(1);
    std::thread::Builder::new()
        .name("tia-analyze".into())
        .spawn(move || {
            // Receiver may be gone after a timeout
            let _ = tx.send(job());
        })
        .map_err(|e| AnalysisError::Worker(e.to_string()))?;

    let received = match limit {
        Some(limit) => rx.recv_timeout(limit),
        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };
    match received {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            let limit = limit.unwrap_or_default();
            tracing::warn!(secs = limit.as_secs(), "Analysis timed out");
            Err(AnalysisError::Timeout(limit))
        }
        Err(RecvTimeoutError::Disconnected) => {
            tracing::error!("Analysis thread exited without a result");
            Err(AnalysisError::Worker("analysis thread exited without a result".into()))
        }
    }
}

fn run(options: &SelectOptions, settings: &RunSettings) -> Result<AnalysisReport, AnalysisError> {
    let markers = &settings.graph.test_file_markers;

    if options.all {
        let root = all_mode_root(&options.repo);
        let graph = ModuleGraph::build(&root, &settings.graph)?;
        let resolver = ImpactResolver::new(graph.root(), &settings.extractor, &graph, markers);
        return Ok(resolver.analyze_all());
    }

    let repo = GitRepo::open(&options.repo)?;
    let sha = repo.resolve(&options.commit)?;
    let parent = match options.base.as_deref() {
        Some(base) => Some(repo.resolve(base)?),
        None => repo.parent_of(&sha)?,
    };
    let changes = repo.changed_files_since(parent.as_deref(), &sha)?;

    let graph = ModuleGraph::build(repo.root(), &settings.graph)?;
    let resolver = ImpactResolver::new(repo.root(), &settings.extractor, &graph, markers);
    let mut report = resolver.analyze(&changes, &sha, parent.as_deref(), Some(&repo));
    report.commit_ref = options.commit.clone();
    Ok(report)
}

/// The work-tree root when inside git, else the directory itself
fn all_mode_root(dir: &Path) -> PathBuf {
    match GitRepo::open(dir) {
        Ok(repo) => repo.root().to_path_buf(),
        Err(_) => normalize_path(dir),
    }
}
