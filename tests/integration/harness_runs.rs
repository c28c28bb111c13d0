/// Full compliance runs against the bundled test server
use std::time::Duration;

use mcp_forge::*;

const TEST_SERVER: &str = env!("CARGO_BIN_EXE_forge-test-server");

fn server_config(mode: &str) -> HarnessConfig {
    let command = ServerCommand::new(TEST_SERVER, vec!["--mode".to_string(), mode.to_string()]);
    let mut config = HarnessConfig::new(command);
    config.startup_timeout = Duration::from_millis(200);
    config.request_timeout = Duration::from_secs(5);
    config.shutdown_timeout = Duration::from_secs(3);
    config
}

fn status(report: &RunReport, case: &str) -> VerdictStatus {
    report
        .verdict(case)
        .unwrap_or_else(|| panic!("no verdict for {}", case))
        .status
}

fn detail<'a>(report: &'a RunReport, case: &str) -> &'a str {
    report
        .verdict(case)
        .map(|v| v.detail.as_str())
        .unwrap_or_default()
}

#[cfg(test)]
mod harness_runs {
    use super::*;

    #[tokio::test]
    async fn test_compliant_server_passes_everything() {
        let report = run_test_suite(&server_config("compliant")).await;

        assert_eq!(report.total, 7, "{:#?}", report.verdicts);
        assert_eq!(report.passed, 7, "{:#?}", report.verdicts);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(detail(&report, "tools/list"), "found 1 tool(s)");
        assert_eq!(detail(&report, "tools/call"), "`echo` returned 1 content block(s)");
        assert!(detail(&report, "server_stop").starts_with("exited with code 0"));
        assert!(report
            .stderr
            .iter()
            .any(|line| line.contains("forge-test-server: ready")));
    }

    #[tokio::test]
    async fn test_verdicts_follow_script_order() {
        let report = run_test_suite(&server_config("compliant")).await;
        let names: Vec<_> = report.verdicts.iter().map(|v| v.case_name.as_str()).collect();
        let expected: Vec<_> = TestCase::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_notifications_and_stderr_noise_are_tolerated() {
        let report = run_test_suite(&server_config("chatty")).await;

        assert_eq!(report.passed, 7, "{:#?}", report.verdicts);
        assert!(report.stderr.len() >= 250);
    }

    #[tokio::test]
    async fn test_swapped_ids_fail_both_cases() {
        let report = run_test_suite(&server_config("swap-ids")).await;

        assert_eq!(report.total, 7);
        for case in ["initialize", "tools/list"] {
            assert_eq!(status(&report, case), VerdictStatus::Failed);
            assert!(
                detail(&report, case).contains("id mismatch"),
                "{}: {}",
                case,
                detail(&report, case)
            );
        }
        assert_eq!(detail(&report, "initialize"), "TransportError: id mismatch: expected 1, got 2");
        assert_eq!(status(&report, "tools/call"), VerdictStatus::Failed);
        assert_eq!(status(&report, "ping"), VerdictStatus::Passed);
        assert_eq!(status(&report, "unknown_method"), VerdictStatus::Passed);
        assert_eq!(status(&report, "server_stop"), VerdictStatus::Passed);
    }

    #[tokio::test]
    async fn test_silent_ping_times_out_and_kills_the_server() {
        let mut config = server_config("hang-on-ping");
        config.request_timeout = Duration::from_millis(500);
        let report = run_test_suite(&config).await;

        assert_eq!(report.total, 7);
        assert_eq!(status(&report, "ping"), VerdictStatus::Failed);
        assert_eq!(detail(&report, "ping"), "Timeout: no response within 500 ms");
        assert_eq!(status(&report, "unknown_method"), VerdictStatus::Skipped);
        assert_eq!(
            detail(&report, "unknown_method"),
            "skipped: prior failure (ping failed)"
        );
        assert_eq!(status(&report, "server_stop"), VerdictStatus::Passed);
        assert!(detail(&report, "server_stop").contains("already killed"));
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_result_for_unknown_method_fails() {
        let report = run_test_suite(&server_config("bare-result-unknown")).await;

        assert_eq!(status(&report, "unknown_method"), VerdictStatus::Failed);
        assert!(detail(&report, "unknown_method").contains("an error response was required"));
        assert_eq!(report.passed, 6);
    }

    #[tokio::test]
    async fn test_exit_after_initialize_skips_the_rest() {
        // Repeated because the exit races the next write
        for _ in 0..5 {
            let report = run_test_suite(&server_config("exit-after-initialize")).await;

            assert_eq!(report.total, 7);
            assert_eq!(status(&report, "initialize"), VerdictStatus::Passed);
            for case in ["tools/list", "tools/call", "ping", "unknown_method"] {
                assert_eq!(status(&report, case), VerdictStatus::Skipped, "{}", case);
                assert_eq!(
                    detail(&report, case),
                    "skipped: prior failure (server exited with code 1)"
                );
            }
            assert_eq!(status(&report, "server_stop"), VerdictStatus::Passed);
            assert_eq!(
                detail(&report, "server_stop"),
                "process already exited with code 1; nothing to terminate"
            );
            assert_eq!(report.exit_code(), 1);
        }
    }

    #[tokio::test]
    async fn test_crash_on_start_is_never_a_pass() {
        let mut config = server_config("crash-on-start");
        config.startup_timeout = Duration::from_secs(2);
        let report = run_test_suite(&config).await;

        assert_eq!(report.total, 7);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(status(&report, "server_start"), VerdictStatus::Failed);
        assert_eq!(
            detail(&report, "server_start"),
            "ProcessExited: server exited with code 3 during startup"
        );
        assert_eq!(report.skipped, 5);
        assert_eq!(
            detail(&report, "initialize"),
            "skipped: prior failure (server_start failed)"
        );
        assert_eq!(status(&report, "server_stop"), VerdictStatus::Passed);
        assert!(report
            .stderr
            .iter()
            .any(|line| line.contains("refusing to start")));
    }

    #[tokio::test]
    async fn test_plain_text_banner_breaks_initialize() {
        let report = run_test_suite(&server_config("banner")).await;

        assert_eq!(report.total, 7);
        assert_eq!(status(&report, "initialize"), VerdictStatus::Failed);
        assert!(
            detail(&report, "initialize").starts_with("TransportError: malformed line"),
            "{}",
            detail(&report, "initialize")
        );
        assert!(detail(&report, "initialize").contains("listening on stdio"));
        for case in ["tools/list", "tools/call", "ping", "unknown_method"] {
            assert_eq!(status(&report, case), VerdictStatus::Skipped, "{}", case);
            assert_eq!(
                detail(&report, case),
                "skipped: prior failure (initialize failed)"
            );
        }
        assert_eq!(status(&report, "server_stop"), VerdictStatus::Passed);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_spawn_failure_skips_every_other_case() {
        let config = HarnessConfig::new(ServerCommand::new("/nonexistent/mcp-server", vec![]));
        let report = run_test_suite(&config).await;

        assert_eq!(report.total, 7);
        assert_eq!(status(&report, "server_start"), VerdictStatus::Failed);
        assert!(detail(&report, "server_start").starts_with("SpawnError"));
        assert_eq!(report.skipped, 6);
        assert_eq!(
            detail(&report, "server_stop"),
            "skipped: prior failure (server_start failed)"
        );
    }

    #[tokio::test]
    async fn test_server_ignoring_eof_is_a_soft_failure() {
        let mut config = server_config("ignore-eof");
        config.shutdown_timeout = Duration::from_millis(300);
        let report = run_test_suite(&config).await;

        assert_eq!(report.passed, 7, "{:#?}", report.verdicts);
        assert!(detail(&report, "server_stop").starts_with("slow shutdown"));

        config.strict_shutdown = true;
        let strict = run_test_suite(&config).await;
        assert_eq!(status(&strict, "server_stop"), VerdictStatus::Failed);
        assert_eq!(strict.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_no_tools_means_nothing_to_call() {
        let report = run_test_suite(&server_config("no-tools")).await;

        assert_eq!(report.passed, 7, "{:#?}", report.verdicts);
        assert_eq!(
            detail(&report, "tools/call"),
            "no tools advertised; nothing to call"
        );
    }

    #[tokio::test]
    async fn test_custom_accepted_codes_are_enforced() {
        let mut config = server_config("compliant");
        config.unknown_method_codes = vec![-32600];
        let report = run_test_suite(&config).await;

        assert_eq!(status(&report, "unknown_method"), VerdictStatus::Failed);
        assert!(detail(&report, "unknown_method").starts_with("expected error code -32600"));
    }
}
