/// Static validator tests on throwaway project directories
use std::fs;
use std::path::Path;

use mcp_forge::validator::{self, CheckLevel};
use mcp_forge::*;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create directory");
    }
    fs::write(path, contents).expect("Failed to write file");
}

fn complete_project() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let root = dir.path();
    write(root, "pyproject.toml", "[project]\nname = \"weather\"\n");
    write(root, "src/weather/__init__.py", "");
    write(root, "src/weather/server.py", "");
    write(root, "src/weather/tools.py", "");
    write(root, "README.md", "# weather\n");
    write(root, "Dockerfile", "FROM python:3.12\n");
    write(root, ".gitignore", "__pycache__/\n");
    dir
}

#[cfg(test)]
mod validator_tests {
    use super::*;

    #[test]
    fn test_complete_project_is_valid() {
        let dir = complete_project();
        let findings = validator::validate_project_structure(dir.path());
        assert!(findings.is_valid());
        assert_eq!(findings.warnings().count(), 0);

        let report = findings.into_run_report("Validation", "weather");
        assert!(report.all_passed());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_missing_recommended_files_only_warn() {
        let dir = complete_project();
        fs::remove_file(dir.path().join("Dockerfile")).expect("Failed to remove Dockerfile");

        let findings = validator::validate_project_structure(dir.path());
        assert!(findings.is_valid());
        let warnings: Vec<_> = findings.warnings().map(|c| c.message.as_str()).collect();
        assert_eq!(warnings, vec!["missing recommended file: Dockerfile"]);
    }

    #[test]
    fn test_missing_required_files_are_errors() {
        let dir = complete_project();
        fs::remove_file(dir.path().join("pyproject.toml")).expect("Failed to remove pyproject");
        fs::remove_file(dir.path().join("src/weather/tools.py"))
            .expect("Failed to remove tools.py");

        let findings = validator::validate_project_structure(dir.path());
        let errors: Vec<_> = findings.errors().map(|c| c.message.as_str()).collect();
        assert_eq!(
            errors,
            vec!["missing pyproject.toml", "missing tools.py in package"]
        );

        let report = findings.into_run_report("Validation", "weather");
        assert_eq!(report.failed, 2);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_src_without_package_stops_early() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write(dir.path(), "pyproject.toml", "");
        write(dir.path(), "src/notes.txt", "");

        let findings = validator::validate_project_structure(dir.path());
        let last = findings.checks().last().expect("at least one check");
        assert_eq!(last.level, CheckLevel::Error);
        assert_eq!(last.message, "no Python package found in src/");
    }

    #[test]
    fn test_tools_file_accepts_array_or_object() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let tool = r#"{"name": "get_forecast", "description": "Forecast",
            "inputSchema": {"type": "object"}}"#;
        write(dir.path(), "array.json", &format!("[{}]", tool));
        write(dir.path(), "object.json", &format!("{{\"tools\": [{}]}}", tool));
        write(dir.path(), "wrong.json", "{\"resources\": []}");

        let findings = validator::validate_tools_file(&dir.path().join("array.json"))
            .expect("Failed to read array manifest");
        assert!(findings.is_valid());

        let findings = validator::validate_tools_file(&dir.path().join("object.json"))
            .expect("Failed to read object manifest");
        assert!(findings.is_valid());

        let findings = validator::validate_tools_file(&dir.path().join("wrong.json"))
            .expect("Failed to read manifest");
        assert!(!findings.is_valid());
    }

    #[test]
    fn test_tools_file_errors_surface_as_forge_errors() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write(dir.path(), "broken.json", "[{");

        let missing = validator::validate_tools_file(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ForgeError::Io(_))));

        let broken = validator::validate_tools_file(&dir.path().join("broken.json"));
        assert!(matches!(broken, Err(ForgeError::Json(_))));
    }

    #[test]
    fn test_resources_file_is_checked_against_the_resource_schema() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write(
            dir.path(),
            "resources.json",
            r#"{"resources": [
                {"uri": "weather://cities", "name": "Cities", "mimeType": "application/json"},
                {"name": "no uri"}
            ]}"#,
        );
        write(dir.path(), "flat.json", r#"[{"uri": "weather://alerts", "name": "Alerts"}]"#);
        write(dir.path(), "wrong.json", r#"{"tools": []}"#);

        let findings = validator::validate_resources_file(&dir.path().join("resources.json"))
            .expect("Failed to read resource manifest");
        let errors: Vec<_> = findings.errors().map(|c| c.message.as_str()).collect();
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0].starts_with("resource #1: "));
        assert!(errors[0].contains("uri"));

        let findings = validator::validate_resources_file(&dir.path().join("flat.json"))
            .expect("Failed to read flat manifest");
        assert!(findings.is_valid());

        let findings = validator::validate_resources_file(&dir.path().join("wrong.json"))
            .expect("Failed to read manifest");
        let last = findings.checks().last().expect("one finding");
        assert_eq!(last.category, "resources");
        assert!(last.message.ends_with("has no `resources` array"));
    }

    #[test]
    fn test_merged_findings_keep_order() {
        let dir = complete_project();
        let mut findings = validator::validate_project_structure(dir.path());
        let structure_checks = findings.checks().len();
        findings.merge(validator::validate_tool_definitions(&[]));

        assert_eq!(findings.checks().len(), structure_checks + 1);
        let last = findings.checks().last().expect("merged check");
        assert_eq!(last.category, "tools");
        assert_eq!(last.level, CheckLevel::Warning);
    }
}
