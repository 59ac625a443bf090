//! Impact analysis core
//!
//! Classifies tests touched by a set of file changes: DIRECT by line
//! intersection, DEPENDENCY through the import graph, REMOVED by comparing
//! declared names against the parent revision. Also builds the selection
//! contract handed to runner bridges.

mod analysis;
mod format;
mod types;

pub use types::{
    AnalysisReport, Diagnostic, FileAnalysisResult, ImpactType, ImpactedTest, SkipReason,
};

pub use analysis::{synthesize_changes, ImpactResolver, ALL_FILES_REF};
pub use format::{
    empty_selection_json, escape_test_name, RemovedTest, TestSelection, EMPTY_SELECTION_JSON,
};
