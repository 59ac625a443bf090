//! Configuration file support for tia
//!
//! Config files are loaded in order (later overrides earlier):
//! 1. `~/.config/tia/config.toml` (user defaults)
//! 2. `.tia.toml` in project root (project overrides)
//!
//! CLI flags override all config file values.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::graph::{GraphOptions, DEFAULT_VENDOR_DIRS};
use crate::parser::{TestExtractor, DEFAULT_TEST_FILE_MARKERS, DEFAULT_TEST_FUNCTIONS};

/// Configuration options loaded from config files
///
/// # Example
///
/// ```toml
/// # ~/.config/tia/config.toml or .tia.toml
/// test_functions = ["describe", "it", "test", "scenario"]
/// test_file_markers = ["test", "spec", "e2e"]
/// vendor_dirs = ["node_modules", "dist", "generated"]
/// timeout_secs = 120   # Abort the whole analysis after this long
/// no_ignore = false    # Index files excluded by .gitignore
/// quiet = false
/// verbose = false
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Callee names recognized as test declarations
    pub test_functions: Option<Vec<String>>,
    /// Filename markers identifying test files (`login.spec.ts` -> `spec`)
    pub test_file_markers: Option<Vec<String>>,
    /// Directory names excluded from indexing and traversal
    pub vendor_dirs: Option<Vec<String>>,
    /// Whole-run timeout (overridden by --timeout)
    pub timeout_secs: Option<u64>,
    /// Index gitignored files (overridden by --no-ignore)
    pub no_ignore: Option<bool>,
    /// Enable quiet mode by default
    pub quiet: Option<bool>,
    /// Enable verbose mode by default
    pub verbose: Option<bool>,
}

impl Config {
    /// Load configuration from user and project config files
    pub fn load(project_root: &Path) -> Self {
        let user_config = dirs::config_dir()
            .map(|d| d.join("tia/config.toml"))
            .and_then(|p| Self::load_file(&p))
            .unwrap_or_default();

        let project_config = Self::load_file(&project_root.join(".tia.toml")).unwrap_or_default();

        // Project overrides user
        let merged = user_config.override_with(project_config);
        tracing::debug!(
            test_functions = ?merged.test_functions,
            test_file_markers = ?merged.test_file_markers,
            vendor_dirs = ?merged.vendor_dirs,
            timeout_secs = ?merged.timeout_secs,
            no_ignore = ?merged.no_ignore,
            "Effective config after merge"
        );
        merged
    }

    /// Load configuration from a specific file
    pub fn load_file(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read config {}: {}", path.display(), e);
                return None;
            }
        };

        match toml::from_str::<Self>(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded config");
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Layer another config on top (other overrides self where present).
    ///
    /// Lists replace rather than merge, so a project can narrow the set.
    pub fn override_with(self, other: Self) -> Self {
        Config {
            test_functions: other.test_functions.or(self.test_functions),
            test_file_markers: other.test_file_markers.or(self.test_file_markers),
            vendor_dirs: other.vendor_dirs.or(self.vendor_dirs),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            no_ignore: other.no_ignore.or(self.no_ignore),
            quiet: other.quiet.or(self.quiet),
            verbose: other.verbose.or(self.verbose),
        }
    }

    // ===== Accessors with defaults =====

    pub fn test_functions_or_default(&self) -> Vec<String> {
        list_or(&self.test_functions, DEFAULT_TEST_FUNCTIONS)
    }

    pub fn test_file_markers_or_default(&self) -> Vec<String> {
        list_or(&self.test_file_markers, DEFAULT_TEST_FILE_MARKERS)
    }

    pub fn vendor_dirs_or_default(&self) -> Vec<String> {
        list_or(&self.vendor_dirs, DEFAULT_VENDOR_DIRS)
    }

    /// Whole-run timeout; `None` (or 0) means unbounded
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }

    pub fn no_ignore_or_default(&self) -> bool {
        self.no_ignore.unwrap_or(false)
    }

    /// Get quiet mode with default fallback (false)
    pub fn quiet_or_default(&self) -> bool {
        self.quiet.unwrap_or(false)
    }

    /// Get verbose mode with default fallback (false)
    pub fn verbose_or_default(&self) -> bool {
        self.verbose.unwrap_or(false)
    }

    /// Extractor recognizing the configured callee names
    pub fn extractor(&self) -> TestExtractor {
        TestExtractor::new(self.test_functions_or_default())
    }

    /// Graph options from the configured markers and vendor dirs
    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            vendor_dirs: self.vendor_dirs_or_default(),
            test_file_markers: self.test_file_markers_or_default(),
            no_ignore: self.no_ignore_or_default(),
            ..GraphOptions::default()
        }
    }
}

/// Configured list, or the defaults when unset or empty
fn list_or(list: &Option<Vec<String>>, defaults: &[&str]) -> Vec<String> {
    match list {
        Some(items) if !items.is_empty() => items.clone(),
        _ => defaults.iter().map(|s| s.to_string()).collect(),
    }
}
