//! Impact resolution: intersection, dependency and removal

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::types::{
    AnalysisReport, Diagnostic, FileAnalysisResult, ImpactType, ImpactedTest, SkipReason,
};
use crate::diff_parse::{ChangeStatus, FileChange};
use crate::git::RevisionSource;
use crate::graph::ModuleGraph;
use crate::language::Language;
use crate::parser::{is_test_file, TestDeclaration, TestExtractor};

/// Commit label used by the history-free mode
pub const ALL_FILES_REF: &str = "(all)";

type Outcome = Result<Vec<TestDeclaration>, SkipReason>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Changes come from a diff
    Diff,
    /// Synthesized changes with no line information
    Everything,
}

/// Classifies every candidate test for a set of file changes.
///
/// Borrows an immutable graph and extractor; holds no state between calls.
pub struct ImpactResolver<'a> {
    root: PathBuf,
    extractor: &'a TestExtractor,
    graph: &'a ModuleGraph,
    markers: Vec<String>,
}

impl<'a> ImpactResolver<'a> {
    pub fn new(
        root: &Path,
        extractor: &'a TestExtractor,
        graph: &'a ModuleGraph,
        markers: &[String],
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            extractor,
            graph,
            markers: markers.to_vec(),
        }
    }

    /// Analyze the changes `commit` introduced relative to `parent`.
    ///
    /// Current content is read at `commit` through `history` when given, so
    /// line numbers agree with the diff; otherwise from the working tree.
    /// Removal detection needs both `parent` and `history`. Per-file
    /// failures never abort the run; they land in `diagnostics`.
    pub fn analyze(
        &self,
        changes: &[FileChange],
        commit: &str,
        parent: Option<&str>,
        history: Option<&dyn RevisionSource>,
    ) -> AnalysisReport {
        let _span = tracing::info_span!("analyze", commit, changes = changes.len()).entered();
        self.run(changes, commit, parent, history, Mode::Diff)
    }

    /// Select every test in the project, ignoring history.
    ///
    /// Every indexed file becomes a MODIFIED change with no changed lines, so
    /// intersection never fires and test files are covered whole-file.
    pub fn analyze_all(&self) -> AnalysisReport {
        let _span = tracing::info_span!("analyze_all", files = self.graph.len()).entered();
        let changes = synthesize_changes(self.graph);
        self.run(&changes, ALL_FILES_REF, None, None, Mode::Everything)
    }

    fn run(
        &self,
        changes: &[FileChange],
        commit: &str,
        parent: Option<&str>,
        history: Option<&dyn RevisionSource>,
        mode: Mode,
    ) -> AnalysisReport {
        let mut session = ParseSession::new(self.extractor, &self.root, commit, history);
        let mut results = Vec::new();
        let mut processed: HashSet<String> = HashSet::new();

        // Changed test files first, so one that is also a dependent is
        // classified by intersection
        let (test_changes, other_changes): (Vec<&FileChange>, Vec<&FileChange>) =
            changes.iter().partition(|c| self.is_test(&c.path));

        for change in test_changes {
            if !processed.insert(change.path.clone()) {
                continue;
            }
            let result = match mode {
                Mode::Diff => self.analyze_test_change(change, parent, &mut session),
                Mode::Everything => {
                    let outcome = session.current(&change.path);
                    whole_file(&change.path, Some(change.status), outcome, &mut session)
                }
            };
            results.push(result);
        }

        let mut dependents = Vec::new();
        for change in other_changes {
            if change.status == ChangeStatus::Deleted {
                tracing::debug!(file = %change.path, "Deleted non-test file, not traversed");
                continue;
            }
            let mut starts = vec![change.path.as_str()];
            if let Some(old) = change.old_path.as_deref() {
                starts.push(old);
            }
            for start in starts {
                for id in self.graph.transitive_test_importers(Path::new(start)) {
                    let rel = &self.graph.node(id).rel_path;
                    if processed.insert(rel.clone()) {
                        dependents.push(rel.clone());
                    }
                }
            }
        }

        session.preload(&dependents);
        for file in &dependents {
            let outcome = session.current(file);
            results.push(whole_file(file, None, outcome, &mut session));
        }

        let report = AnalysisReport::new(
            commit,
            self.root.display().to_string(),
            results,
            session.finish(),
        );
        tracing::info!(
            files = report.file_results.len(),
            tests = report.total_tests_selected,
            diagnostics = report.diagnostics.len(),
            "Analysis complete"
        );
        report
    }

    /// Intersection plus removal detection for one changed test file
    fn analyze_test_change(
        &self,
        change: &FileChange,
        parent: Option<&str>,
        session: &mut ParseSession<'_>,
    ) -> FileAnalysisResult {
        let path = change.path.as_str();

        if change.status == ChangeStatus::Deleted {
            let mut result = FileAnalysisResult::new(path, Some(change.status));
            match session.at_parent(parent, change.parent_path()) {
                Ok(old) => {
                    for decl in unique_by_name(&old) {
                        result.push(removed(path, decl));
                    }
                }
                Err(reason) => session.diagnose(path, reason),
            }
            return result;
        }

        let current = match session.current(path) {
            Ok(decls) => decls,
            Err(reason) => {
                tracing::warn!(file = path, %reason, "Falling back to full-file execution");
                session.diagnose(path, reason);
                return FileAnalysisResult::full_file(path, Some(change.status));
            }
        };

        let mut result = FileAnalysisResult::new(path, Some(change.status));
        for decl in current
            .iter()
            .filter(|d| change.touches(d.start_line, d.end_line))
        {
            result.push(impacted(path, decl, ImpactType::Direct));
        }

        if matches!(
            change.status,
            ChangeStatus::Modified | ChangeStatus::Renamed
        ) {
            match session.at_parent(parent, change.parent_path()) {
                Ok(old) => {
                    let now: HashSet<&str> = current.iter().map(|d| d.name.as_str()).collect();
                    for decl in unique_by_name(&old) {
                        if !now.contains(decl.name.as_str()) {
                            result.push(removed(path, decl));
                        }
                    }
                }
                // Root commit or no history: nothing to compare against
                Err(SkipReason::MissingHistoricalContent) if parent.is_none() => {}
                Err(reason) => session.diagnose(path, reason),
            }
        }
        result
    }

    fn is_test(&self, path: &str) -> bool {
        let path = Path::new(path);
        Language::from_path(path).is_some() && is_test_file(path, &self.markers)
    }
}

/// One MODIFIED change with no lines per indexed file
pub fn synthesize_changes(graph: &ModuleGraph) -> Vec<FileChange> {
    graph
        .nodes()
        .iter()
        .map(|n| FileChange::new(n.rel_path.clone(), ChangeStatus::Modified))
        .collect()
}

/// Every declaration as DEPENDENCY, or the coarse fallback on failure
fn whole_file(
    path: &str,
    status: Option<ChangeStatus>,
    outcome: Outcome,
    session: &mut ParseSession<'_>,
) -> FileAnalysisResult {
    match outcome {
        Ok(decls) => {
            let mut result = FileAnalysisResult::new(path, status);
            for decl in &decls {
                result.push(impacted(path, decl, ImpactType::Dependency));
            }
            result
        }
        Err(reason) => {
            tracing::warn!(file = path, %reason, "Falling back to full-file execution");
            session.diagnose(path, reason);
            FileAnalysisResult::full_file(path, status)
        }
    }
}

fn impacted(file: &str, decl: &TestDeclaration, impact_type: ImpactType) -> ImpactedTest {
    ImpactedTest {
        test_name: decl.name.clone(),
        file_name: file.to_string(),
        impact_type,
        is_dynamic: decl.is_dynamic,
        line: Some(decl.start_line),
    }
}

fn removed(file: &str, decl: &TestDeclaration) -> ImpactedTest {
    ImpactedTest {
        line: None,
        ..impacted(file, decl, ImpactType::Removed)
    }
}

/// First declaration of each name, in source order
fn unique_by_name(decls: &[TestDeclaration]) -> Vec<&TestDeclaration> {
    let mut seen = HashSet::new();
    decls.iter().filter(|d| seen.insert(d.name.as_str())).collect()
}

/// Declarations memoized per file and side for one analysis run.
///
/// Historical content lives only as long as the session.
struct ParseSession<'a> {
    extractor: &'a TestExtractor,
    root: &'a Path,
    commit: &'a str,
    history: Option<&'a dyn RevisionSource>,
    current: HashMap<String, Outcome>,
    parent: HashMap<String, Outcome>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> ParseSession<'a> {
    fn new(
        extractor: &'a TestExtractor,
        root: &'a Path,
        commit: &'a str,
        history: Option<&'a dyn RevisionSource>,
    ) -> Self {
        Self {
            extractor,
            root,
            commit,
            history,
            current: HashMap::new(),
            parent: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Declarations in the analyzed version of `path`
    fn current(&mut self, path: &str) -> Outcome {
        if let Some(outcome) = self.current.get(path) {
            return outcome.clone();
        }
        let outcome = load_current(self.extractor, self.root, self.commit, self.history, path);
        self.current.insert(path.to_string(), outcome.clone());
        outcome
    }

    /// Extract many files in parallel ahead of sequential use
    fn preload(&mut self, paths: &[String]) {
        let (extractor, root, commit, history) =
            (self.extractor, self.root, self.commit, self.history);
        let pending: Vec<&String> = paths
            .iter()
            .filter(|p| !self.current.contains_key(*p))
            .collect();
        let loaded: Vec<(String, Outcome)> = pending
            .par_iter()
            .map(|p| {
                let outcome = load_current(extractor, root, commit, history, p);
                ((*p).clone(), outcome)
            })
            .collect();
        self.current.extend(loaded);
    }

    /// Declarations in the parent version, read from history
    fn at_parent(&mut self, parent: Option<&str>, path: &str) -> Outcome {
        let (Some(parent), Some(history)) = (parent, self.history) else {
            return Err(SkipReason::MissingHistoricalContent);
        };
        if let Some(outcome) = self.parent.get(path) {
            return outcome.clone();
        }
        let outcome = match history.file_content_at(parent, path) {
            Ok(Some(source)) => extract(self.extractor, path, &source),
            Ok(None) => Err(SkipReason::MissingHistoricalContent),
            Err(e) => {
                tracing::warn!(file = path, error = %e, "Cannot read parent content");
                Err(SkipReason::MissingHistoricalContent)
            }
        };
        self.parent.insert(path.to_string(), outcome.clone());
        outcome
    }

    fn diagnose(&mut self, file: &str, reason: SkipReason) {
        tracing::warn!(file, %reason, "Skipped");
        self.diagnostics.push(Diagnostic {
            file: file.to_string(),
            reason,
        });
    }

    fn finish(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

fn load_current(
    extractor: &TestExtractor,
    root: &Path,
    commit: &str,
    history: Option<&dyn RevisionSource>,
    path: &str,
) -> Outcome {
    if let Some(history) = history {
        match history.file_content_at(commit, path) {
            Ok(Some(source)) => return extract(extractor, path, &source),
            Ok(None) => tracing::debug!(file = path, "Not in history, reading work tree"),
            Err(e) => {
                tracing::warn!(file = path, error = %e, "History read failed, reading work tree")
            }
        }
    }
    match std::fs::read_to_string(root.join(path)) {
        Ok(source) => extract(extractor, path, &source),
        Err(e) => Err(SkipReason::Unreadable(e.to_string())),
    }
}

fn extract(extractor: &TestExtractor, path: &str, source: &str) -> Outcome {
    let Some(language) = Language::from_path(Path::new(path)) else {
        return Err(SkipReason::UnsupportedLanguage);
    };
    extractor
        .extract(source, language)
        .map_err(|e| SkipReason::ParseFailure(e.to_string()))
}
