//! Human-readable report rendering

use std::fmt::Write;

use colored::Colorize;

use tia::impact::{AnalysisReport, FileAnalysisResult, ImpactType, TestSelection};

/// Render a report for a terminal.
///
/// Quiet mode prints only the files to run, one per line.
pub(crate) fn render_report(report: &AnalysisReport, quiet: bool) -> String {
    let selection = TestSelection::from_report(report);
    let mut out = String::new();

    if quiet {
        for file in &selection.files {
            let _ = writeln!(out, "{}", file);
        }
        return out;
    }

    let _ = writeln!(
        out,
        "{} {}: {} tests in {} files",
        "Commit".bold(),
        report.commit_ref.cyan(),
        report.total_tests_selected,
        report.file_results.len()
    );

    if report.file_results.is_empty() {
        let _ = writeln!(out, "{}", "No impacted tests.".dimmed());
    }
    for result in &report.file_results {
        render_file(&mut out, result);
    }

    if !report.diagnostics.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", "Skipped:".yellow().bold());
        for diag in &report.diagnostics {
            let _ = writeln!(out, "  {}: {}", diag.file, diag.reason.to_string().dimmed());
        }
    }

    if !selection.grep.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} {}", "grep:".bold(), selection.grep);
    }
    if selection.has_dynamic_tests {
        let _ = writeln!(
            out,
            "{} {}",
            "whole files:".bold(),
            selection.files_with_dynamic_tests.join(", ")
        );
    }
    out
}

fn render_file(out: &mut String, result: &FileAnalysisResult) {
    let label = match result.status {
        Some(status) => status.to_string(),
        None => "dependent".to_string(),
    };
    let _ = writeln!(out, "  {} ({})", result.file.bold(), label.dimmed());

    if result.requires_full_file {
        let _ = writeln!(out, "    {}", "tests unknown, run whole file".yellow());
        return;
    }
    for test in &result.tests {
        let kind = match test.impact_type {
            ImpactType::Direct => format!("{:<10}", test.impact_type).green(),
            ImpactType::Dependency => format!("{:<10}", test.impact_type).yellow(),
            ImpactType::Removed => format!("{:<10}", test.impact_type).red(),
        };
        let dynamic = if test.is_dynamic {
            format!(" {}", "[dynamic]".cyan())
        } else {
            String::new()
        };
        let line = test.line.map(|l| format!(" :{}", l)).unwrap_or_default();
        let name = &test.test_name;
        let _ = writeln!(out, "    {} {}{}{}", kind, name, dynamic, line.dimmed());
    }
}
