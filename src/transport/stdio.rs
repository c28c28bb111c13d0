/// JSON-RPC over the server's stdin/stdout
///
/// Requests go out as one JSON object per line. Responses come back through
/// the framed stdout channel and are matched against the id the harness is
/// waiting for; anything else is a transport error, never silently accepted.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::mcp::{
    parse_incoming, IncomingMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId,
};
use crate::process::{ProcessSupervisor, SubprocessHandle, WaitOutcome};
use crate::transport::framing::StdoutEvent;

/// Longest slice of an offending line quoted in an error
const MAX_QUOTED_LINE: usize = 200;

/// Minimum time given to a process to report its exit code once stdout closes
const EXIT_CODE_GRACE: Duration = Duration::from_millis(250);

/// Errors on the stdio channel itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("stdin is already closed")]
    Closed,

    #[error("write to stdin failed: {0}")]
    Write(String),

    #[error("read from stdout failed: {0}")]
    Read(String),

    #[error("could not encode message: {0}")]
    Encode(String),

    #[error("malformed line ({reason}): {line}")]
    Malformed { line: String, reason: String },

    #[error("id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: RequestId, actual: String },

    #[error("stdout closed while the process kept running")]
    StdoutClosed,
}

impl TransportError {
    /// Whether the conversation can carry on after this error
    ///
    /// An id mismatch still consumed exactly one line for one request, so the
    /// stream is in step; every other error leaves it unusable.
    pub fn halts_run(&self) -> bool {
        !matches!(self, TransportError::IdMismatch { .. })
    }
}

/// What came back for one request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Response(JsonRpcResponse),
    Timeout,
    ProcessExited(Option<i32>),
    TransportError(TransportError),
}

/// Line-delimited JSON-RPC channel over a [`SubprocessHandle`]
#[derive(Debug, Clone, Default)]
pub struct StdioTransport {
    supervisor: ProcessSupervisor,
}

impl StdioTransport {
    pub fn new(supervisor: ProcessSupervisor) -> Self {
        Self { supervisor }
    }

    /// Write one request line and flush
    pub async fn send(
        &self,
        handle: &mut SubprocessHandle,
        request: &JsonRpcRequest,
    ) -> Result<(), TransportError> {
        self.write_line(handle, request).await
    }

    /// Write one notification line and flush
    pub async fn notify(
        &self,
        handle: &mut SubprocessHandle,
        notification: &JsonRpcNotification,
    ) -> Result<(), TransportError> {
        self.write_line(handle, notification).await
    }

    async fn write_line<T: Serialize>(
        &self,
        handle: &mut SubprocessHandle,
        message: &T,
    ) -> Result<(), TransportError> {
        let mut line =
            serde_json::to_string(message).map_err(|e| TransportError::Encode(e.to_string()))?;
        line.push('\n');

        let stdin = handle.stdin_mut().ok_or(TransportError::Closed)?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::Write(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| TransportError::Write(e.to_string()))?;

        debug!(message = %line.trim_end(), "sent to server");
        Ok(())
    }

    /// Wait up to `timeout` for the response to `expected_id`
    pub async fn receive(
        &self,
        handle: &mut SubprocessHandle,
        expected_id: &RequestId,
        timeout: Duration,
    ) -> Outcome {
        let deadline = Instant::now() + timeout;

        loop {
            let event = match tokio::time::timeout_at(deadline, handle.stdout_mut().recv()).await {
                Err(_) => {
                    debug!(id = %expected_id, "timed out waiting for response");
                    return Outcome::Timeout;
                }
                Ok(None) => StdoutEvent::Closed,
                Ok(Some(event)) => event,
            };

            match event {
                StdoutEvent::Line(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    debug!(line = %line, "received from server");
                    if let Some(outcome) = match_line(&line, expected_id) {
                        return outcome;
                    }
                }
                StdoutEvent::Partial(line) => {
                    return Outcome::TransportError(TransportError::Malformed {
                        line: quote(&line),
                        reason: "stream ended before the line was terminated".to_string(),
                    });
                }
                StdoutEvent::Oversized(size) => {
                    return Outcome::TransportError(TransportError::Malformed {
                        line: format!("<{} bytes>", size),
                        reason: "line exceeds size limit".to_string(),
                    });
                }
                StdoutEvent::ReadError(e) => {
                    return Outcome::TransportError(TransportError::Read(e));
                }
                StdoutEvent::Closed => {
                    let remaining = deadline
                        .saturating_duration_since(Instant::now())
                        .max(EXIT_CODE_GRACE);
                    return match self.supervisor.wait_with_timeout(handle, remaining).await {
                        WaitOutcome::Exited(code) => Outcome::ProcessExited(code),
                        WaitOutcome::TimedOut => {
                            Outcome::TransportError(TransportError::StdoutClosed)
                        }
                    };
                }
            }
        }
    }
}

/// Classify one non-blank line; `None` means skip it and keep waiting
fn match_line(line: &str, expected_id: &RequestId) -> Option<Outcome> {
    match parse_incoming(line) {
        Err(reason) => Some(Outcome::TransportError(TransportError::Malformed {
            line: quote(line),
            reason,
        })),
        Ok(IncomingMessage::Notification { method }) => {
            debug!(method = %method, "skipping server notification");
            None
        }
        Ok(IncomingMessage::ServerRequest { id, method }) => {
            warn!(id = ?id, method = %method, "ignoring server-initiated request");
            None
        }
        Ok(IncomingMessage::Response(response)) => {
            if response.id.as_ref() == Some(expected_id) {
                return Some(Outcome::Response(response));
            }
            let actual = match &response.id {
                Some(id) => id.to_string(),
                None => "null".to_string(),
            };
            Some(Outcome::TransportError(TransportError::IdMismatch {
                expected: expected_id.clone(),
                actual,
            }))
        }
    }
}

fn quote(line: &str) -> String {
    if line.chars().count() <= MAX_QUOTED_LINE {
        return line.to_string();
    }
    let head: String = line.chars().take(MAX_QUOTED_LINE).collect();
    format!("{}...", head)
}
