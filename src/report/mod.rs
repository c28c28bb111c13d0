/// Verdicts and run reports
///
/// Both the runtime harness and the static project validator produce the
/// same shape: an ordered list of verdicts, finalized into a read-only
/// report with summary counts and an exit code.

pub mod render;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

pub use render::{render, render_json, render_table, OutputFormat};

/// How a single check ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    Passed,
    Failed,
    /// Not executed because an earlier case failed
    Skipped,
}

/// The judgment for one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub case_name: String,
    pub status: VerdictStatus,
    /// Human-readable explanation naming the expectation checked
    pub detail: String,
}

impl Verdict {
    pub fn pass(case_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            case_name: case_name.into(),
            status: VerdictStatus::Passed,
            detail: detail.into(),
        }
    }

    pub fn fail(case_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            case_name: case_name.into(),
            status: VerdictStatus::Failed,
            detail: detail.into(),
        }
    }

    /// A case that never ran because of `cause` earlier in the run
    pub fn skipped(case_name: impl Into<String>, cause: &str) -> Self {
        Self {
            case_name: case_name.into(),
            status: VerdictStatus::Skipped,
            detail: format!("skipped: prior failure ({})", cause),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == VerdictStatus::Passed
    }
}

/// Finalized, read-only result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub title: String,
    /// What was checked: a command line or a project directory
    pub subject: String,
    pub verdicts: Vec<Verdict>,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
    /// Diagnostic output of the server, never used for validation
    pub stderr: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }

    /// Process exit status for CI use: 0 only when every verdict passed
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    pub fn verdict(&self, case_name: &str) -> Option<&Verdict> {
        self.verdicts.iter().find(|v| v.case_name == case_name)
    }
}

/// Collects verdicts in arrival order and produces the final report
#[derive(Debug)]
pub struct ReportBuilder {
    title: String,
    subject: String,
    verdicts: Vec<Verdict>,
    stderr: Vec<String>,
    started_at: DateTime<Utc>,
    finalized: Option<RunReport>,
}

impl ReportBuilder {
    pub fn new(title: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subject: subject.into(),
            verdicts: Vec::new(),
            stderr: Vec::new(),
            started_at: Utc::now(),
            finalized: None,
        }
    }

    /// Append a verdict; ignored once the report is finalized
    pub fn record(&mut self, verdict: Verdict) {
        if self.finalized.is_some() {
            warn!(case = %verdict.case_name, "report already finalized, dropping verdict");
            return;
        }
        self.verdicts.push(verdict);
    }

    /// Attach captured server stderr; ignored once the report is finalized
    pub fn attach_stderr(&mut self, lines: Vec<String>) {
        if self.finalized.is_none() {
            self.stderr = lines;
        }
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    /// Compute the counts once; every later call returns the same snapshot
    pub fn finalize(&mut self) -> RunReport {
        if let Some(report) = &self.finalized {
            return report.clone();
        }

        let count = |status: VerdictStatus| {
            self.verdicts
                .iter()
                .filter(|v| v.status == status)
                .count()
        };
        let report = RunReport {
            title: self.title.clone(),
            subject: self.subject.clone(),
            passed: count(VerdictStatus::Passed),
            failed: count(VerdictStatus::Failed),
            skipped: count(VerdictStatus::Skipped),
            total: self.verdicts.len(),
            verdicts: self.verdicts.clone(),
            stderr: self.stderr.clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
        };
        self.finalized = Some(report.clone());
        report
    }
}
