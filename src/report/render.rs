/// Report rendering: a plain-text table for people, JSON for machines

use std::fmt::Write;

use clap::ValueEnum;

use crate::report::{RunReport, VerdictStatus};

/// Captured stderr lines shown under the table
const STDERR_TAIL: usize = 20;

/// How a report is written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

pub fn render(report: &RunReport, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Table => Ok(render_table(report)),
        OutputFormat::Json => render_json(report),
    }
}

pub fn render_json(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

pub fn render_table(report: &RunReport) -> String {
    let name_width = report
        .verdicts
        .iter()
        .map(|v| v.case_name.chars().count())
        .chain(std::iter::once("Test".len()))
        .max()
        .unwrap_or(4);
    let status_width = "Status".len().max("SKIP".len());

    let mut out = String::new();
    let _ = writeln!(out, "{}", report.title);
    let _ = writeln!(out, "{}", report.subject);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<name_width$}  {:<status_width$}  Details",
        "Test", "Status"
    );
    let _ = writeln!(
        out,
        "{}  {}  {}",
        "-".repeat(name_width),
        "-".repeat(status_width),
        "-".repeat(7)
    );
    for verdict in &report.verdicts {
        let status = match verdict.status {
            VerdictStatus::Passed => "PASS",
            VerdictStatus::Failed => "FAIL",
            VerdictStatus::Skipped => "SKIP",
        };
        let _ = writeln!(
            out,
            "{:<name_width$}  {:<status_width$}  {}",
            verdict.case_name, status, verdict.detail
        );
    }

    let _ = writeln!(out);
    let _ = write!(out, "{}/{} passed", report.passed, report.total);
    if report.all_passed() {
        let _ = writeln!(out, "  All tests passed!");
    } else {
        let _ = writeln!(
            out,
            "  {} failed, {} skipped",
            report.failed, report.skipped
        );
    }

    if !report.stderr.is_empty() {
        let shown = report.stderr.len().min(STDERR_TAIL);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Server stderr (last {} of {} lines):",
            shown,
            report.stderr.len()
        );
        for line in &report.stderr[report.stderr.len() - shown..] {
            let _ = writeln!(out, "  {}", line);
        }
    }

    out
}
