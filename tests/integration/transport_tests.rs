/// Transport and supervisor behaviour against a live test server
use std::time::Duration;

use mcp_forge::mcp::{JsonRpcRequest, RequestId};
use mcp_forge::process::{ProcessState, ProcessSupervisor};
use mcp_forge::transport::{Outcome, StdioTransport, TransportError};
use mcp_forge::ServerCommand;

const TEST_SERVER: &str = env!("CARGO_BIN_EXE_forge-test-server");

fn compliant_server() -> ServerCommand {
    ServerCommand::new(TEST_SERVER, vec!["--mode".to_string(), "compliant".to_string()])
}

#[cfg(test)]
mod transport_tests {
    use super::*;

    #[tokio::test]
    async fn test_started_handle_reports_its_command_line() {
        let supervisor = ProcessSupervisor::new();
        let command = compliant_server();
        let mut handle = supervisor.start(&command, None).expect("Failed to start server");

        assert_eq!(handle.command(), command.display());
        assert!(handle.pid().is_some());
        assert_eq!(handle.state(), ProcessState::Running);

        supervisor.kill(&mut handle).await;
        supervisor.release(handle).await;
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let supervisor = ProcessSupervisor::new();
        let transport = StdioTransport::new(supervisor.clone());
        let mut handle = supervisor
            .start(&compliant_server(), None)
            .expect("Failed to start server");

        let request = JsonRpcRequest::new(7, "ping", None);
        transport
            .send(&mut handle, &request)
            .await
            .expect("Failed to send ping");
        match transport
            .receive(&mut handle, &RequestId::Number(7), Duration::from_secs(5))
            .await
        {
            Outcome::Response(response) => assert_eq!(response.id, Some(RequestId::Number(7))),
            other => panic!("expected a response, got {:?}", other),
        }

        let state = supervisor.terminate(&mut handle, Duration::from_secs(3)).await;
        assert_eq!(state, ProcessState::Stopped);
        supervisor.release(handle).await;
    }

    #[tokio::test]
    async fn test_send_after_close_stdin_is_closed_error() {
        let supervisor = ProcessSupervisor::new();
        let transport = StdioTransport::new(supervisor.clone());
        let mut handle = supervisor
            .start(&compliant_server(), None)
            .expect("Failed to start server");

        supervisor.close_stdin(&mut handle);
        let err = transport
            .send(&mut handle, &JsonRpcRequest::new(1, "ping", None))
            .await
            .expect_err("write after close should fail");
        assert_eq!(err, TransportError::Closed);
        assert!(err.halts_run());

        supervisor.release(handle).await;
    }
}
