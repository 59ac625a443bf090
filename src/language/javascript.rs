//! JavaScript language definition

use super::LanguageDef;

static DEFINITION: LanguageDef = LanguageDef {
    name: "javascript",
    grammar: || tree_sitter_javascript::LANGUAGE.into(),
    extensions: &["js", "jsx", "mjs", "cjs"],
};

pub fn definition() -> &'static LanguageDef {
    &DEFINITION
}
