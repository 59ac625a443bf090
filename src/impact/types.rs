//! Data types for impact analysis

use serde::Serialize;

use crate::diff_parse::ChangeStatus;

/// Why a test was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImpactType {
    /// The test's span overlaps a changed line in its own file
    Direct,
    /// The test's file imports a changed file, directly or transitively
    Dependency,
    /// The test existed in the parent revision and is gone now
    Removed,
}

impl std::fmt::Display for ImpactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            ImpactType::Direct => "DIRECT",
            ImpactType::Dependency => "DEPENDENCY",
            ImpactType::Removed => "REMOVED",
        })
    }
}

/// One selected (or removed) test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactedTest {
    pub test_name: String,
    pub file_name: String,
    pub impact_type: ImpactType,
    pub is_dynamic: bool,
    /// Declaration line in the current version; absent for removed tests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Impacted tests of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysisResult {
    pub file: String,
    /// Change status when the file itself changed; absent for dependents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ChangeStatus>,
    pub tests: Vec<ImpactedTest>,
    pub has_dynamic_tests: bool,
    /// Tests could not be enumerated; run the whole file
    pub requires_full_file: bool,
}

impl FileAnalysisResult {
    pub fn new(file: impl Into<String>, status: Option<ChangeStatus>) -> Self {
        Self {
            file: file.into(),
            status,
            tests: Vec::new(),
            has_dynamic_tests: false,
            requires_full_file: false,
        }
    }

    /// Coarse fallback for a file whose tests are unknown.
    ///
    /// Marked dynamic so no consumer narrows it to a name pattern.
    pub fn full_file(file: impl Into<String>, status: Option<ChangeStatus>) -> Self {
        Self {
            has_dynamic_tests: true,
            requires_full_file: true,
            ..Self::new(file, status)
        }
    }

    pub fn push(&mut self, test: ImpactedTest) {
        self.has_dynamic_tests |= test.is_dynamic;
        self.tests.push(test);
    }
}

/// Why a file's tests could not be fully determined
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum SkipReason {
    /// Content failed to parse
    ParseFailure(String),
    /// No prior-revision content; removal detection skipped
    MissingHistoricalContent,
    /// Current content could not be read
    Unreadable(String),
    /// Extension has no grammar
    UnsupportedLanguage,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::ParseFailure(msg) => write!(f, "parse failure: {}", msg),
            SkipReason::MissingHistoricalContent => f.write_str("no historical content"),
            SkipReason::Unreadable(msg) => write!(f, "unreadable: {}", msg),
            SkipReason::UnsupportedLanguage => f.write_str("unsupported language"),
        }
    }
}

/// A per-file degradation absorbed during analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub file: String,
    pub reason: SkipReason,
}

/// Result of one analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub commit_ref: String,
    pub repo_path: String,
    pub file_results: Vec<FileAnalysisResult>,
    /// Sum of `tests.len()` over `file_results`
    pub total_tests_selected: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisReport {
    pub fn new(
        commit_ref: impl Into<String>,
        repo_path: impl Into<String>,
        file_results: Vec<FileAnalysisResult>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let total_tests_selected = file_results.iter().map(|r| r.tests.len()).sum();
        Self {
            commit_ref: commit_ref.into(),
            repo_path: repo_path.into(),
            file_results,
            total_tests_selected,
            diagnostics,
        }
    }

    /// Iterate every impacted test across files
    pub fn tests(&self) -> impl Iterator<Item = &ImpactedTest> {
        self.file_results.iter().flat_map(|r| r.tests.iter())
    }
}
