//! Module specifier extraction
//!
//! Collects every specifier a file pulls in: static `import`, re-exporting
//! `export ... from`, TypeScript `import x = require(...)`, CommonJS
//! `require(...)` and dynamic `import(...)`. Only literal string specifiers
//! count; computed ones cannot be resolved statically.

use std::collections::BTreeSet;

use tree_sitter::Node;

use super::{parse_tree, string_value, visit_preorder, Language, ParserError};

/// Extract the raw module specifiers imported by `source`.
///
/// Lenient about syntax errors: whatever parses still contributes edges, so a
/// half-edited file does not cut the graph.
pub fn extract_imports(source: &str, language: Language) -> Result<BTreeSet<String>, ParserError> {
    let tree = parse_tree(source, language)?;
    let mut specifiers = BTreeSet::new();

    visit_preorder(tree.root_node(), |node| {
        let spec = match node.kind() {
            "import_statement" | "export_statement" | "import_require_clause" => node
                .child_by_field_name("source")
                .filter(|s| s.kind() == "string"),
            "call_expression" => call_specifier(node, source),
            _ => None,
        };
        if let Some(spec) = spec {
            let value = string_value(spec, source);
            if !value.is_empty() {
                specifiers.insert(value);
            }
        }
    });

    Ok(specifiers)
}

/// `require('x')` or `import('x')` with a literal first argument
fn call_specifier<'t>(call: Node<'t>, source: &str) -> Option<Node<'t>> {
    let callee = call.child_by_field_name("function")?;
    let is_loader = match callee.kind() {
        "import" => true,
        "identifier" => &source[callee.byte_range()] == "require",
        _ => false,
    };
    if !is_loader {
        return None;
    }
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let first = args
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment")?;
    (first.kind() == "string").then_some(first)
}
