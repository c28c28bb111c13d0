/// Subprocess lifecycle for the server under test
///
/// The supervisor spawns the server with all three stdio streams piped,
/// keeps stdout and stderr draining on background tasks, and owns every
/// bounded wait on the process: the startup window, the shutdown wait, and the
/// graceful-then-forceful teardown.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ServerCommand;
use crate::transport::framing::{read_lines, StdoutEvent};

/// Most recent stderr lines kept for the report
pub const MAX_STDERR_LINES: usize = 500;

/// Errors that can occur while launching the server
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("failed to spawn `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("spawned `{program}` but its {stream} pipe was not captured")]
    MissingPipe {
        program: String,
        stream: &'static str,
    },
}

/// Where the server process is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    NotStarted,
    Running,
    /// Exited on its own after the harness asked it to shut down
    Stopped,
    /// Forcefully killed by the harness
    Killed,
    /// Exited before the harness asked it to
    Crashed,
}

impl ProcessState {
    pub fn is_running(self) -> bool {
        matches!(self, ProcessState::Running)
    }
}

/// Result of a bounded wait for process exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The process exited; `None` when it was ended by a signal
    Exited(Option<i32>),
    TimedOut,
}

/// Shared sink for the server's stderr
#[derive(Debug, Clone, Default)]
pub struct StderrCapture {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl StderrCapture {
    fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() == MAX_STDERR_LINES {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    /// Copy of everything captured so far, oldest first
    pub fn snapshot(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

/// A running (or finished) server process and its pipes
///
/// Dropping the handle aborts the pipe readers and, through `kill_on_drop`,
/// kills the child if it is still alive.
pub struct SubprocessHandle {
    child: Child,
    pid: Option<u32>,
    command: String,
    stdin: Option<ChildStdin>,
    stdout: mpsc::UnboundedReceiver<StdoutEvent>,
    stderr: StderrCapture,
    tasks: Vec<JoinHandle<()>>,
    state: ProcessState,
    exit_code: Option<i32>,
    shutdown_requested: bool,
}

impl SubprocessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn stderr(&self) -> &StderrCapture {
        &self.stderr
    }

    pub(crate) fn stdin_mut(&mut self) -> Option<&mut ChildStdin> {
        self.stdin.as_mut()
    }

    pub(crate) fn stdout_mut(&mut self) -> &mut mpsc::UnboundedReceiver<StdoutEvent> {
        &mut self.stdout
    }

    /// Non-blocking liveness check; records the exit if it already happened
    pub fn poll_exit(&mut self) -> Option<WaitOutcome> {
        if !self.state.is_running() {
            return Some(WaitOutcome::Exited(self.exit_code));
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.record_exit(status.code());
                Some(WaitOutcome::Exited(status.code()))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "failed to poll server process");
                None
            }
        }
    }

    fn record_exit(&mut self, code: Option<i32>) {
        self.exit_code = code;
        if self.state.is_running() {
            self.state = if self.shutdown_requested {
                ProcessState::Stopped
            } else {
                ProcessState::Crashed
            };
            info!(pid = ?self.pid, code = ?code, state = ?self.state, "server process exited");
        }
    }
}

impl Drop for SubprocessHandle {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Spawns and tears down the server under test
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    /// Bound on reaping a process after it has been sent a kill
    reap_timeout: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self {
            reap_timeout: Duration::from_secs(2),
        }
    }
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `command` with stdin, stdout and stderr piped to the harness
    pub fn start(
        &self,
        command: &ServerCommand,
        working_dir: Option<&Path>,
    ) -> Result<SubprocessHandle, SpawnError> {
        let shown = command.display();
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| SpawnError::Io {
            program: command.program.clone(),
            source,
        })?;

        let missing = |stream| SpawnError::MissingPipe {
            program: command.program.clone(),
            stream,
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let capture = StderrCapture::default();
        let tasks = vec![
            tokio::spawn(read_lines(stdout, events_tx)),
            tokio::spawn(capture_stderr(stderr, capture.clone())),
        ];

        let pid = child.id();
        info!(pid = ?pid, command = %shown, "spawned server process");

        Ok(SubprocessHandle {
            child,
            pid,
            command: shown,
            stdin: Some(stdin),
            stdout: events_rx,
            stderr: capture,
            tasks,
            state: ProcessState::Running,
            exit_code: None,
            shutdown_requested: false,
        })
    }

    /// Wait up to `timeout` for the process to exit on its own
    pub async fn wait_with_timeout(
        &self,
        handle: &mut SubprocessHandle,
        timeout: Duration,
    ) -> WaitOutcome {
        if !handle.state.is_running() {
            return WaitOutcome::Exited(handle.exit_code);
        }
        match tokio::time::timeout(timeout, handle.child.wait()).await {
            Ok(Ok(status)) => {
                handle.record_exit(status.code());
                WaitOutcome::Exited(status.code())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "failed to wait for server process");
                handle.record_exit(None);
                WaitOutcome::Exited(None)
            }
            Err(_) => WaitOutcome::TimedOut,
        }
    }

    /// Close the server's stdin, the cooperative MCP shutdown request
    pub fn close_stdin(&self, handle: &mut SubprocessHandle) {
        handle.shutdown_requested = true;
        if handle.stdin.take().is_some() {
            debug!(pid = ?handle.pid, "closed server stdin");
        }
    }

    /// Ask the server to stop, then kill it if it is still alive after `grace`
    pub async fn terminate(&self, handle: &mut SubprocessHandle, grace: Duration) -> ProcessState {
        if !handle.state.is_running() {
            return handle.state;
        }
        self.close_stdin(handle);
        match self.wait_with_timeout(handle, grace).await {
            WaitOutcome::Exited(_) => handle.state,
            WaitOutcome::TimedOut => {
                warn!(
                    pid = ?handle.pid,
                    grace_ms = grace.as_millis() as u64,
                    "server ignored shutdown request"
                );
                self.kill(handle).await
            }
        }
    }

    /// Forcefully kill the process and reap it
    pub async fn kill(&self, handle: &mut SubprocessHandle) -> ProcessState {
        if !handle.state.is_running() {
            return handle.state;
        }
        handle.stdin.take();
        if let Err(e) = handle.child.start_kill() {
            warn!(pid = ?handle.pid, error = %e, "failed to kill server process");
        }
        let code = match tokio::time::timeout(self.reap_timeout, handle.child.wait()).await {
            Ok(Ok(status)) => status.code(),
            Ok(Err(e)) => {
                warn!(pid = ?handle.pid, error = %e, "failed to reap killed server process");
                None
            }
            Err(_) => {
                warn!(pid = ?handle.pid, "killed server process did not exit in time");
                None
            }
        };
        handle.exit_code = code;
        handle.state = ProcessState::Killed;
        warn!(pid = ?handle.pid, "server process killed");
        handle.state
    }

    /// Release the handle once the run is over and return the captured stderr
    ///
    /// A process still running is killed first. Pipe readers get until
    /// `reap_timeout` to drain what is left; readers still blocked after that
    /// (a grandchild holding the pipes open) are aborted.
    pub async fn release(&self, mut handle: SubprocessHandle) -> Vec<String> {
        if handle.state.is_running() {
            self.kill(&mut handle).await;
        }
        let deadline = tokio::time::Instant::now() + self.reap_timeout;
        for mut task in std::mem::take(&mut handle.tasks) {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                debug!(pid = ?handle.pid, "pipe reader still blocked, aborting");
                task.abort();
            }
        }
        handle.stderr.snapshot()
    }
}

async fn capture_stderr<R>(stderr: R, capture: StderrCapture)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end_matches(['\n', '\r']).to_string();
                debug!(target: "mcp_forge::server_stderr", "{}", text);
                capture.push(text);
            }
            Err(e) => {
                debug!(error = %e, "stopped reading server stderr");
                break;
            }
        }
    }
}
