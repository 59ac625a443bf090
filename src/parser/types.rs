//! Data types for the parser module

use serde::Serialize;
use thiserror::Error;

pub use crate::language::Language;

/// Errors that can occur while extracting declarations from a file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
    /// File extension not recognized as a supported language
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    /// Tree-sitter could not be set up or produced no tree
    #[error("Failed to parse: {0}")]
    ParseFailed(String),
    /// The source has a syntax error (or uses a dialect the grammar rejects)
    #[error("Syntax error near line {line}")]
    SyntaxError { line: u32 },
}

/// One invocation of a test-declaration construct (a test case or a group).
///
/// Recomputed on every analysis and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDeclaration {
    /// Declared name. For dynamic names this is a display rendering only and
    /// must never be fed into a literal match pattern.
    pub name: String,
    /// First line of the whole call expression (1-indexed)
    pub start_line: u32,
    /// Last line of the whole call expression (1-indexed, inclusive)
    pub end_line: u32,
    /// Name is not a fixed string (interpolation, identifier, table row)
    pub is_dynamic: bool,
}
