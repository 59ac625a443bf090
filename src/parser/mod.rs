//! Source parsing with tree-sitter
//!
//! Split into submodules:
//! - `types`: declaration type and error types
//! - `imports`: module specifier extraction for the import graph
//!
//! Extraction is a pure function of source text, so it applies equally to
//! on-disk content and to historical content fetched from git.

mod imports;
pub mod types;

pub use imports::extract_imports;
pub use types::{Language, ParserError, TestDeclaration};

use std::collections::HashSet;
use std::path::Path;

use tree_sitter::Node;

/// Callee names recognized as test declarations when no config overrides them
pub const DEFAULT_TEST_FUNCTIONS: &[&str] = &["describe", "it", "test"];

/// Filename markers for test files when no config overrides them
pub const DEFAULT_TEST_FILE_MARKERS: &[&str] = &["test", "spec"];

/// Member properties that keep a call a declaration: `test.only`,
/// `describe.skip`, `test.describe.serial`, ...
const MODIFIERS: &[&str] = &[
    "only",
    "skip",
    "todo",
    "concurrent",
    "sequential",
    "fixme",
    "fail",
    "fails",
    "failing",
    "serial",
    "parallel",
    "describe",
    "slow",
];

/// Curried forms `x.each(table)("name", fn)`: the runtime name is formatted
/// per row, so the declared text is never a literal match
const PARAMETERIZED: &[&str] = &["each", "for"];

/// Curried forms whose name argument stays literal: `test.skipIf(cond)("name", fn)`
const CONDITIONAL: &[&str] = &["skipIf", "runIf"];

/// Extracts test declarations from JavaScript/TypeScript source.
///
/// Recognition is a capability lookup over a configurable set of callee
/// names, so other frameworks' spellings can be added through config.
///
/// # Example
///
/// ```
/// use tia::parser::{Language, TestExtractor};
///
/// let source = "describe('auth', () => {\n  it('logs in', () => {});\n});\n";
/// let decls = TestExtractor::default().extract(source, Language::TypeScript)?;
/// assert_eq!(decls.len(), 2);
/// assert_eq!(decls[1].name, "logs in");
/// # Ok::<(), tia::parser::ParserError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TestExtractor {
    recognized: HashSet<String>,
}

impl Default for TestExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TEST_FUNCTIONS.iter().copied())
    }
}

impl TestExtractor {
    /// Create an extractor recognizing the given callee names
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            recognized: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `name` is a recognized declaration callee
    pub fn recognizes(&self, name: &str) -> bool {
        self.recognized.contains(name)
    }

    /// Extract declarations from a file, choosing the grammar by extension.
    ///
    /// `path` only selects the language; the file is not read.
    pub fn extract_path(
        &self,
        path: &Path,
        source: &str,
    ) -> Result<Vec<TestDeclaration>, ParserError> {
        let language = Language::from_path(path).ok_or_else(|| {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            ParserError::UnsupportedFileType(ext.to_string())
        })?;
        self.extract(source, language)
    }

    /// Extract every test declaration, in source order.
    ///
    /// Nested groups and cases are all reported. Content with syntax errors
    /// yields `ParserError::SyntaxError`; callers treat that as "skip file".
    pub fn extract(
        &self,
        source: &str,
        language: Language,
    ) -> Result<Vec<TestDeclaration>, ParserError> {
        let _span = tracing::debug_span!("extract", %language, bytes = source.len()).entered();

        let tree = parse_tree(source, language)?;
        let root = tree.root_node();
        if root.has_error() {
            let line = first_error_line(root).unwrap_or(1);
            return Err(ParserError::SyntaxError { line });
        }

        let mut decls = Vec::new();
        visit_preorder(root, |node| {
            if node.kind() == "call_expression" {
                if let Some(decl) = self.declaration_at(node, source) {
                    decls.push(decl);
                }
            }
        });

        tracing::debug!(count = decls.len(), "Extracted test declarations");
        Ok(decls)
    }

    fn declaration_at(&self, call: Node<'_>, source: &str) -> Option<TestDeclaration> {
        let callee = call.child_by_field_name("function")?;
        let parameterized = self.resolve_callee(callee, source)?;

        // Tagged templates (test`...`) have a template_string here instead
        let args = call.child_by_field_name("arguments")?;
        if args.kind() != "arguments" {
            return None;
        }
        let mut cursor = args.walk();
        let first = args
            .named_children(&mut cursor)
            .find(|n| n.kind() != "comment")?;

        // A leading callback means a hook-like call, not a named declaration
        if matches!(
            first.kind(),
            "arrow_function" | "function_expression" | "function"
        ) {
            return None;
        }

        let (name, dynamic_name) = declared_name(first, source);
        Some(TestDeclaration {
            name,
            start_line: call.start_position().row as u32 + 1,
            end_line: call.end_position().row as u32 + 1,
            is_dynamic: dynamic_name || parameterized,
        })
    }

    /// Returns `Some(parameterized)` if `callee` names a declaration construct
    fn resolve_callee(&self, callee: Node<'_>, source: &str) -> Option<bool> {
        match callee.kind() {
            "identifier" => self.recognizes(node_text(callee, source)).then_some(false),
            "member_expression" => {
                let mut current = callee;
                loop {
                    match current.kind() {
                        "member_expression" => {
                            let property = current.child_by_field_name("property")?;
                            if !MODIFIERS.contains(&node_text(property, source)) {
                                return None;
                            }
                            current = current.child_by_field_name("object")?;
                        }
                        "identifier" => {
                            return self.recognizes(node_text(current, source)).then_some(false);
                        }
                        _ => return None,
                    }
                }
            }
            "call_expression" => {
                let inner = callee.child_by_field_name("function")?;
                if inner.kind() != "member_expression" {
                    return None;
                }
                let property = node_text(inner.child_by_field_name("property")?, source);
                let parameterized = if PARAMETERIZED.contains(&property) {
                    true
                } else if CONDITIONAL.contains(&property) {
                    false
                } else {
                    return None;
                };
                let object = inner.child_by_field_name("object")?;
                let inner_parameterized = self.resolve_callee(object, source)?;
                Some(parameterized || inner_parameterized)
            }
            _ => None,
        }
    }
}

/// Classify a file as a test file purely by its name.
///
/// `login.spec.ts` is a test file for marker `spec` because its stem ends
/// in `.spec`. No content inspection.
pub fn is_test_file<S: AsRef<str>>(path: &Path, markers: &[S]) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    match stem.rsplit_once('.') {
        Some((_, marker)) => markers.iter().any(|m| m.as_ref() == marker),
        None => false,
    }
}

/// Parse `source` with the grammar for `language`.
///
/// Does not reject trees containing ERROR nodes; callers decide how strict
/// to be.
pub(crate) fn parse_tree(
    source: &str,
    language: Language,
) -> Result<tree_sitter::Tree, ParserError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language.grammar())
        .map_err(|e| ParserError::ParseFailed(format!("{:?}", e)))?;
    parser
        .parse(source, None)
        .ok_or_else(|| ParserError::ParseFailed(format!("{} parser returned no tree", language)))
}

/// Depth-first pre-order traversal (source order)
pub(crate) fn visit_preorder<'t>(root: Node<'t>, mut f: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        f(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

pub(crate) fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

/// Content of a string literal node without its quotes, escapes decoded
pub(crate) fn string_value(node: Node<'_>, source: &str) -> String {
    let text = node_text(node, source);
    let inner = if text.len() >= 2 {
        &text[1..text.len() - 1]
    } else {
        text
    };
    unescape(inner)
}

fn first_error_line(root: Node<'_>) -> Option<u32> {
    let mut line = None;
    visit_preorder(root, |node| {
        if line.is_none() && (node.is_error() || node.is_missing()) {
            line = Some(node.start_position().row as u32 + 1);
        }
    });
    line
}

/// Name text and whether it is dynamic
fn declared_name(node: Node<'_>, source: &str) -> (String, bool) {
    match node.kind() {
        "string" => (string_value(node, source), false),
        "template_string" => {
            let mut cursor = node.walk();
            let interpolated = node
                .named_children(&mut cursor)
                .any(|c| c.kind() == "template_substitution");
            let text = node_text(node, source);
            let inner = text.trim_start_matches('`').trim_end_matches('`');
            if interpolated {
                (inner.to_string(), true)
            } else {
                (unescape(inner), false)
            }
        }
        _ => {
            let text = node_text(node, source);
            (text.split_whitespace().collect::<Vec<_>>().join(" "), true)
        }
    }
}

/// Decode the escapes that commonly appear in test names
fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(q @ ('\\' | '\'' | '"' | '`' | '$')) => out.push(q),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
