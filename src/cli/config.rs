//! Configuration and project root detection
//!
//! Provides project root detection and config file application.

use std::path::{Path, PathBuf};

use super::Cli;

/// Find the project root at or above `start` by looking for common markers.
///
/// The nearest directory carrying any marker wins.
pub(crate) fn find_project_root(start: &Path) -> PathBuf {
    let start = dunce::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
    let mut current = start.as_path();

    loop {
        let markers = [
            ".tia.toml",     // Explicit config
            "package.json",  // Node.js
            "tsconfig.json", // TypeScript without package.json
            ".git",          // Git repository root (fallback)
        ];

        if markers.iter().any(|m| current.join(m).exists()) {
            return current.to_path_buf();
        }

        // Move up
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    tracing::debug!(start = %start.display(), "No project root found, using start directory");
    start
}

/// Apply config file defaults to CLI options
/// CLI flags always override config values
pub(super) fn apply_config_defaults(cli: &mut Cli, config: &tia::config::Config) {
    if cli.timeout.is_none() {
        cli.timeout = config.timeout_secs.filter(|s| *s > 0);
    }
    if !cli.no_ignore {
        if let Some(true) = config.no_ignore {
            cli.no_ignore = true;
        }
    }
    if !cli.quiet {
        if let Some(true) = config.quiet {
            cli.quiet = true;
        }
    }
    if !cli.verbose {
        if let Some(true) = config.verbose {
            cli.verbose = true;
        }
    }
}
