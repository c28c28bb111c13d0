/// Unit tests for the harness building blocks that need no process
use mcp_forge::harness::{
    sample_arguments, validate, Observation, StopObservation, ValidationContext,
};
use mcp_forge::process::ProcessState;
use mcp_forge::report::{render_table, ReportBuilder};
use mcp_forge::*;
use serde_json::json;

#[cfg(test)]
mod harness_unit_tests {
    use super::*;

    #[test]
    fn test_script_has_seven_cases_in_order() {
        assert_eq!(TestCase::ALL.len(), 7);
        assert_eq!(TestCase::ALL[0], TestCase::ServerStart);
        assert_eq!(TestCase::ALL[6], TestCase::ServerStop);
        assert_eq!(TestCase::UnknownMethod.name(), "unknown_method");
        assert_eq!(TestCase::ServerStart.method(), None);
    }

    #[test]
    fn test_sample_arguments_cover_every_required_type() {
        let schema = json!({
            "type": "object",
            "properties": {
                "s": {"type": "string"},
                "i": {"type": "integer"},
                "n": {"type": "number"},
                "b": {"type": "boolean"},
                "a": {"type": "array"},
                "o": {"type": "object"}
            },
            "required": ["s", "i", "n", "b", "a", "o"]
        });
        assert_eq!(
            serde_json::Value::Object(sample_arguments(&schema)),
            json!({"s": "test", "i": 0, "n": 0, "b": false, "a": [], "o": {}})
        );
    }

    #[test]
    fn test_server_command_round_trips_through_display() {
        let command = ServerCommand::parse("uv run --directory '/srv/my server' weather")
            .expect("Failed to parse command");
        assert_eq!(command.program, "uv");
        assert_eq!(command.args.len(), 4);
        let again = ServerCommand::parse(&command.display()).expect("Failed to reparse command");
        assert_eq!(again, command);
    }

    #[test]
    fn test_killed_server_stop_respects_strict_flag() {
        let mut config = HarnessConfig::new(ServerCommand::new("server", vec![]));
        let soft = validate(
            TestCase::ServerStop,
            &Observation::Stopped(StopObservation::Killed),
            &ValidationContext::from_config(&config),
        );
        assert_eq!(soft.status, VerdictStatus::Passed);

        config.strict_shutdown = true;
        let strict = validate(
            TestCase::ServerStop,
            &Observation::Stopped(StopObservation::Killed),
            &ValidationContext::from_config(&config),
        );
        assert_eq!(strict.status, VerdictStatus::Failed);
    }

    #[test]
    fn test_already_killed_server_stop_passes() {
        let config = HarnessConfig::new(ServerCommand::new("server", vec![]));
        let verdict = validate(
            TestCase::ServerStop,
            &Observation::Stopped(StopObservation::AlreadyGone {
                state: ProcessState::Killed,
                code: None,
            }),
            &ValidationContext::from_config(&config),
        );
        assert!(verdict.passed());
        assert!(verdict.detail.contains("already killed"));
    }

    #[test]
    fn test_all_passed_table_summary() {
        let mut builder = ReportBuilder::new("MCP Forge Test Results", "server");
        for case in TestCase::ALL {
            builder.record(Verdict::pass(case.name(), "ok"));
        }
        let report = builder.finalize();
        assert_eq!(report.exit_code(), 0);
        assert!(render_table(&report).contains("7/7 passed  All tests passed!"));
    }
}
