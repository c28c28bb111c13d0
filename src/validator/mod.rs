/// Static validation of MCP server projects
///
/// Inspects a generated project on disk without running anything: required
/// files, recommended files, and declared tool definitions. Results use the
/// same verdict and report shape as the runtime harness.

pub mod schema;

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::report::{ReportBuilder, RunReport, Verdict};
use crate::ForgeError;

/// Files every generated project must have inside its package
const REQUIRED_MODULES: &[&str] = &["server.py", "tools.py"];

/// Files a project should have at its root
const RECOMMENDED_FILES: &[&str] = &["README.md", "Dockerfile", ".gitignore"];

/// Severity of a single validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckLevel {
    Pass,
    Warning,
    Error,
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub level: CheckLevel,
    pub category: &'static str,
    pub message: String,
}

/// Findings of a static validation, in the order they were made
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    checks: Vec<Check>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pass(&mut self, category: &'static str, message: impl Into<String>) {
        self.push(CheckLevel::Pass, category, message.into());
    }

    pub fn add_warning(&mut self, category: &'static str, message: impl Into<String>) {
        self.push(CheckLevel::Warning, category, message.into());
    }

    pub fn add_error(&mut self, category: &'static str, message: impl Into<String>) {
        self.push(CheckLevel::Error, category, message.into());
    }

    fn push(&mut self, level: CheckLevel, category: &'static str, message: String) {
        debug!(?level, category, message = %message, "validation check");
        self.checks.push(Check {
            level,
            category,
            message,
        });
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn errors(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| c.level == CheckLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| c.level == CheckLevel::Warning)
    }

    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Append another report's findings after this one's
    pub fn merge(&mut self, other: ValidationReport) {
        self.checks.extend(other.checks);
    }

    /// Render the findings as verdicts; warnings pass with a `warning:` detail
    pub fn into_run_report(self, title: &str, subject: &str) -> RunReport {
        let mut builder = ReportBuilder::new(title, subject);
        for check in self.checks {
            let verdict = match check.level {
                CheckLevel::Pass => Verdict::pass(check.category, check.message),
                CheckLevel::Warning => {
                    Verdict::pass(check.category, format!("warning: {}", check.message))
                }
                CheckLevel::Error => Verdict::fail(check.category, check.message),
            };
            builder.record(verdict);
        }
        builder.finalize()
    }
}

/// Check that `project_dir` has the layout of a generated MCP server project
pub fn validate_project_structure(project_dir: &Path) -> ValidationReport {
    let mut report = ValidationReport::new();

    if project_dir.join("pyproject.toml").is_file() {
        report.add_pass("structure", "found pyproject.toml");
    } else {
        report.add_error("structure", "missing pyproject.toml");
    }

    let src_dir = project_dir.join("src");
    if !src_dir.is_dir() {
        report.add_error("structure", "missing src/ directory");
        return report;
    }

    let Some(package) = find_package(&src_dir) else {
        report.add_error("structure", "no Python package found in src/");
        return report;
    };
    let package_name = package
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    report.add_pass("structure", format!("found package src/{}", package_name));

    for module in REQUIRED_MODULES {
        if package.join(module).is_file() {
            report.add_pass("structure", format!("found {} in package", module));
        } else {
            report.add_error("structure", format!("missing {} in package", module));
        }
    }

    for file in RECOMMENDED_FILES {
        if project_dir.join(file).exists() {
            report.add_pass("structure", format!("found {}", file));
        } else {
            report.add_warning("structure", format!("missing recommended file: {}", file));
        }
    }

    report
}

/// First package directory under `src/`, in name order
fn find_package(src_dir: &Path) -> Option<std::path::PathBuf> {
    let entries = fs::read_dir(src_dir).ok()?;
    let mut packages: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && path.join("__init__.py").is_file())
        .collect();
    packages.sort();
    packages.into_iter().next()
}

/// Check a list of tool definitions against the MCP tool schema
pub fn validate_tool_definitions(tools: &[Value]) -> ValidationReport {
    let mut report = ValidationReport::new();
    if tools.is_empty() {
        report.add_warning("tools", "no tools defined");
        return report;
    }
    let problems = schema::check_tool_definitions(tools);
    if problems.is_empty() {
        report.add_pass("tools", format!("{} tool definition(s) valid", tools.len()));
    }
    for problem in problems {
        report.add_error("tools", problem);
    }
    report
}

/// Check a list of resource descriptors against the MCP resource schema
pub fn validate_resources(resources: &[Value]) -> ValidationReport {
    let mut report = ValidationReport::new();
    if resources.is_empty() {
        report.add_warning("resources", "no resources defined");
        return report;
    }
    for (index, resource) in resources.iter().enumerate() {
        let label = format!("resource #{}", index);
        let problems = schema::check_resource(resource, &label);
        if problems.is_empty() {
            report.add_pass("resources", format!("{} valid", label));
        }
        for problem in problems {
            report.add_error("resources", problem);
        }
    }
    report
}

/// Items of a JSON manifest: a bare array, or an object holding `key`
///
/// A manifest of the wrong shape becomes an error finding under `area`.
fn load_manifest(
    path: &Path,
    key: &str,
    area: &'static str,
) -> Result<Result<Vec<Value>, ValidationReport>, ForgeError> {
    let raw = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)?;
    let problem = match value {
        Value::Array(items) => return Ok(Ok(items)),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => return Ok(Ok(items)),
            _ => format!("{} has no `{}` array", path.display(), key),
        },
        _ => format!(
            "{} must hold an array, or an object with a `{}` array",
            path.display(),
            key
        ),
    };
    let mut report = ValidationReport::new();
    report.add_error(area, problem);
    Ok(Err(report))
}

/// Load a JSON manifest of tools (an array, or an object with a `tools` array)
/// and validate it
pub fn validate_tools_file(path: &Path) -> Result<ValidationReport, ForgeError> {
    debug!(path = %path.display(), "checking tool manifest");
    Ok(match load_manifest(path, "tools", "tools")? {
        Ok(tools) => validate_tool_definitions(&tools),
        Err(report) => report,
    })
}

/// Load a JSON manifest of resources (an array, or an object with a
/// `resources` array) and validate it
pub fn validate_resources_file(path: &Path) -> Result<ValidationReport, ForgeError> {
    debug!(path = %path.display(), "checking resource manifest");
    Ok(match load_manifest(path, "resources", "resources")? {
        Ok(resources) => validate_resources(&resources),
        Err(report) => report,
    })
}
