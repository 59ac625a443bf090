//! Test-selection serialization for downstream runners

use std::collections::HashSet;

use serde::Serialize;

use super::types::{AnalysisReport, ImpactType};
use crate::diff_parse::ChangeStatus;

/// Output printed when a machine-readable run fails
pub const EMPTY_SELECTION_JSON: &str = r#"{"files":[],"tests":[],"grep":""}"#;

/// Characters escaped in test names before joining them into `grep`
const REGEX_SPECIAL: &[char] = &[
    '\\', '^', '$', '.', '|', '?', '*', '+', '(', ')', '[', ']', '{', '}',
];

/// A test that existed in the parent revision and is gone now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedTest {
    pub file_name: String,
    pub test_name: String,
}

/// The JSON contract consumed by runner bridges.
///
/// Dynamic names never reach `tests` or `grep`; their files are still listed
/// in `files` and `filesWithDynamicTests`. Removed tests follow the same
/// rules and are also echoed in `removedTests`, except that a deleted file
/// is never listed in `files` since there is nothing left on disk to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSelection {
    /// Files with at least one impacted test, first-seen order
    pub files: Vec<String>,
    /// Unique literal test names, first-seen order
    pub tests: Vec<String>,
    /// Escaped names joined with `|`; empty when there are none
    pub grep: String,
    pub files_with_dynamic_tests: Vec<String>,
    pub has_dynamic_tests: bool,
    pub removed_tests: Vec<RemovedTest>,
}

impl TestSelection {
    pub fn from_report(report: &AnalysisReport) -> Self {
        let mut selection = Self::default();
        let mut seen_files = HashSet::new();
        let mut seen_tests = HashSet::new();
        let mut seen_dynamic = HashSet::new();

        for result in &report.file_results {
            let mut dynamic = result.requires_full_file;
            for test in &result.tests {
                if test.impact_type == ImpactType::Removed {
                    selection.removed_tests.push(RemovedTest {
                        file_name: test.file_name.clone(),
                        test_name: test.test_name.clone(),
                    });
                }
                if test.is_dynamic {
                    dynamic = true;
                } else if seen_tests.insert(test.test_name.as_str()) {
                    selection.tests.push(test.test_name.clone());
                }
            }

            let gone = result.status == Some(ChangeStatus::Deleted);
            if gone || (result.tests.is_empty() && !result.requires_full_file) {
                continue;
            }
            if seen_files.insert(result.file.as_str()) {
                selection.files.push(result.file.clone());
            }
            if dynamic && seen_dynamic.insert(result.file.as_str()) {
                selection.files_with_dynamic_tests.push(result.file.clone());
            }
        }

        selection.has_dynamic_tests = !selection.files_with_dynamic_tests.is_empty()
            || report.tests().any(|t| t.is_dynamic);
        selection.grep = selection
            .tests
            .iter()
            .map(|t| escape_test_name(t))
            .collect::<Vec<_>>()
            .join("|");
        selection
    }

    /// True when nothing can be run
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Escape regex metacharacters in a literal test name
pub fn escape_test_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if REGEX_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn empty_selection_json() -> &'static str {
    EMPTY_SELECTION_JSON
}
