//! # tia - Test Impact Analysis
//!
//! Picks the individual test cases a commit can affect in a
//! JavaScript/TypeScript project, instead of re-running the whole suite.
//!
//! ## How it works
//!
//! - **Direct**: changed lines (from a zero-context `git diff`) are
//!   intersected with the line spans of `describe`/`it`/`test` calls parsed
//!   by tree-sitter
//! - **Dependency**: a changed helper selects every test file that imports
//!   it, directly or through other helpers
//! - **Removed**: test names present in the parent revision but gone now
//!   are reported separately
//!
//! Names built from interpolation or table rows are flagged dynamic and never
//! enter the name pattern; their files run whole.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tia::config::Config;
//! use tia::impact::TestSelection;
//! use tia::pipeline::{select_tests, SelectOptions};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load(std::path::Path::new("."));
//! let report = select_tests(&SelectOptions::default(), &config)?;
//! let selection = TestSelection::from_report(&report);
//! println!("{}", serde_json::to_string_pretty(&selection)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diff_parse;
pub mod git;
pub mod graph;
pub mod impact;
pub mod language;
pub mod parser;
pub mod pipeline;

pub use diff_parse::{ChangeStatus, FileChange};
pub use git::{GitError, GitRepo, RevisionSource};
pub use graph::{ModuleGraph, ModuleId};
pub use impact::{AnalysisReport, ImpactResolver, TestSelection};
pub use parser::{TestDeclaration, TestExtractor};
pub use pipeline::{select_tests, AnalysisError, SelectOptions};
