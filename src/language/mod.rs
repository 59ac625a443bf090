//! Language registry for test-file parsing
//!
//! Each supported language carries its tree-sitter grammar and the file
//! extensions that select it. All three grammars share the ECMAScript call
//! and import node shapes, so extraction logic is language-agnostic; only the
//! grammar differs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

mod javascript;
mod typescript;

/// A language definition with its parsing configuration
pub struct LanguageDef {
    /// Language name (e.g., "typescript", "tsx")
    pub name: &'static str,
    /// Function to get the tree-sitter grammar
    pub grammar: fn() -> tree_sitter::Language,
    /// File extensions for this language
    pub extensions: &'static [&'static str],
}

/// Supported source languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// TypeScript (.ts, .mts, .cts)
    TypeScript,
    /// TypeScript with JSX (.tsx)
    Tsx,
    /// JavaScript, including JSX and module variants
    JavaScript,
}

impl Language {
    /// Get the language definition
    pub fn def(&self) -> &'static LanguageDef {
        match self {
            Language::TypeScript => typescript::definition(),
            Language::Tsx => typescript::tsx_definition(),
            Language::JavaScript => javascript::definition(),
        }
    }

    /// Look up a language by file extension (without the dot)
    pub fn from_extension(ext: &str) -> Option<Self> {
        REGISTRY
            .from_extension(ext)
            .and_then(|def| def.name.parse().ok())
    }

    /// Look up a language by a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the tree-sitter grammar for this language
    pub fn grammar(&self) -> tree_sitter::Language {
        (self.def().grammar)()
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.def().name)
    }
}

/// Error returned when parsing an invalid Language string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLanguageError {
    /// The invalid input string
    pub input: String,
}

impl std::fmt::Display for ParseLanguageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Unknown language: '{}'. Valid options: typescript, tsx, javascript",
            self.input
        )
    }
}

impl std::error::Error for ParseLanguageError {}

impl std::str::FromStr for Language {
    type Err = ParseLanguageError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "typescript" => Ok(Language::TypeScript),
            "tsx" => Ok(Language::Tsx),
            "javascript" => Ok(Language::JavaScript),
            _ => Err(ParseLanguageError {
                input: s.to_string(),
            }),
        }
    }
}

/// Global language registry
pub static REGISTRY: LazyLock<LanguageRegistry> = LazyLock::new(LanguageRegistry::new);

/// Registry of all supported languages
pub struct LanguageRegistry {
    /// Definitions in registration order
    defs: Vec<&'static LanguageDef>,
    /// Languages indexed by extension
    by_extension: HashMap<&'static str, &'static LanguageDef>,
}

impl LanguageRegistry {
    fn new() -> Self {
        let mut reg = Self {
            defs: Vec::new(),
            by_extension: HashMap::new(),
        };
        reg.register(typescript::definition());
        reg.register(typescript::tsx_definition());
        reg.register(javascript::definition());
        reg
    }

    fn register(&mut self, def: &'static LanguageDef) {
        self.defs.push(def);
        for ext in def.extensions {
            self.by_extension.insert(*ext, def);
        }
    }

    /// Get a language definition by file extension
    pub fn from_extension(&self, ext: &str) -> Option<&'static LanguageDef> {
        self.by_extension.get(ext).copied()
    }

    /// Iterate over all registered languages
    pub fn all(&self) -> impl Iterator<Item = &'static LanguageDef> + '_ {
        self.defs.iter().copied()
    }

    /// All supported extensions, in registration order
    pub fn supported_extensions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.defs.iter().flat_map(|d| d.extensions.iter().copied())
    }
}
