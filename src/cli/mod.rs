//! CLI implementation for tia

mod config;
mod display;

use config::{apply_config_defaults, find_project_root};

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use tia::impact::{AnalysisReport, TestSelection, EMPTY_SELECTION_JSON};
use tia::pipeline::{select_tests, AnalysisError, SelectOptions};

#[derive(Parser)]
#[command(name = "tia")]
#[command(about = "Select the tests a commit can affect")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Repository to analyze (any directory inside the work tree)
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Revision whose changes are analyzed
    #[arg(short, long, default_value = "HEAD")]
    commit: String,

    /// Diff against this revision instead of the commit's parent
    #[arg(long, conflicts_with = "all")]
    base: Option<String>,

    /// Ignore history and select every test
    #[arg(long)]
    all: bool,

    /// Print the runner selection as JSON
    #[arg(long, conflicts_with = "report")]
    json: bool,

    /// Print the full analysis report as JSON
    #[arg(long)]
    report: bool,

    /// Abort the analysis after this many seconds
    #[arg(long, env = "TIA_TIMEOUT")]
    timeout: Option<u64>,

    /// Index files ignored by .gitignore
    #[arg(long)]
    no_ignore: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Show debug info (sets RUST_LOG=debug)
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Cli {
    /// JSON on stdout is a contract; failures must still produce it
    fn machine_readable(&self) -> bool {
        self.json || self.report
    }
}

/// Run CLI with pre-parsed arguments (main.rs inspects verbosity first)
pub fn run_with(mut cli: Cli) -> Result<ExitCode> {
    if let Some(Commands::Completions { shell }) = &cli.command {
        cmd_completions(*shell);
        return Ok(ExitCode::SUCCESS);
    }

    // Load config and apply defaults (CLI flags override config)
    let mut config = tia::config::Config::load(&find_project_root(&cli.repo));
    apply_config_defaults(&mut cli, &config);
    config.no_ignore = Some(cli.no_ignore);

    let options = SelectOptions {
        repo: cli.repo.clone(),
        commit: cli.commit.clone(),
        base: cli.base.clone(),
        all: cli.all,
        timeout: cli.timeout.map(Duration::from_secs),
    };

    let report = match select_tests(&options, &config) {
        Ok(report) => report,
        Err(e) => {
            report_failure(&cli, &e, e.remediation());
            return Ok(ExitCode::FAILURE);
        }
    };

    match render(&cli, &report) {
        Ok(output) => {
            print!("{}", output);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            report_failure(&cli, &e, None);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Build stdout for a finished analysis in the requested format
fn render(cli: &Cli, report: &AnalysisReport) -> Result<String> {
    if cli.report {
        let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        Ok(format!("{}\n", json))
    } else if cli.json {
        let selection = TestSelection::from_report(report);
        let json =
            serde_json::to_string_pretty(&selection).context("Failed to serialize selection")?;
        Ok(format!("{}\n", json))
    } else {
        Ok(display::render_report(report, cli.quiet))
    }
}

/// What stdout carries when the run cannot produce a selection
fn failure_stdout(cli: &Cli) -> Option<&'static str> {
    cli.machine_readable().then_some(EMPTY_SELECTION_JSON)
}

/// Degenerate output for terminal failures
fn report_failure(cli: &Cli, error: &dyn std::fmt::Display, hint: Option<&str>) {
    tracing::error!(error = %error, "Analysis failed");
    if let Some(stdout) = failure_stdout(cli) {
        println!("{}", stdout);
    }
    eprintln!("{} {:#}", "Error:".red().bold(), error);
    if let Some(hint) = hint {
        eprintln!("{} {}", "hint:".yellow(), hint);
    }
}

fn cmd_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    clap_complete::generate(shell, &mut Cli::command(), "tia", &mut std::io::stdout());
}
