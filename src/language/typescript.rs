//! TypeScript language definitions (plain and TSX)

use super::LanguageDef;

static DEFINITION: LanguageDef = LanguageDef {
    name: "typescript",
    grammar: || tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    extensions: &["ts", "mts", "cts"],
};

/// JSX syntax needs the TSX grammar; the plain one reads `<div>` as a cast
static TSX_DEFINITION: LanguageDef = LanguageDef {
    name: "tsx",
    grammar: || tree_sitter_typescript::LANGUAGE_TSX.into(),
    extensions: &["tsx"],
};

pub fn definition() -> &'static LanguageDef {
    &DEFINITION
}

pub fn tsx_definition() -> &'static LanguageDef {
    &TSX_DEFINITION
}
