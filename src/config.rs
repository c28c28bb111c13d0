/// Harness configuration
///
/// Everything a run needs to know before the server is spawned. The CLI
/// builds one of these from its flags; tests build them directly.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::mcp::{error_codes, MCP_VERSION};
use crate::ForgeError;

/// Command line of the server under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a shell-style command string ("python -m my_server.server")
    pub fn parse(command: &str) -> Result<Self, ForgeError> {
        let mut words = shell_words::split(command).map_err(|e| ForgeError::InvalidCommand {
            command: command.to_string(),
            reason: e.to_string(),
        })?;
        if words.is_empty() {
            return Err(ForgeError::InvalidCommand {
                command: command.to_string(),
                reason: "command is empty".to_string(),
            });
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            args: words,
        })
    }

    /// The command re-joined with shell quoting, for reports and logs
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

/// Settings for one compliance run
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub command: ServerCommand,
    /// Working directory for the server process
    pub working_dir: Option<PathBuf>,
    /// How long the server must stay alive after spawning to count as started
    ///
    /// The whole window is waited out, so every run pays it once.
    pub startup_timeout: Duration,
    /// Per-request wait for a response line
    pub request_timeout: Duration,
    /// How long the server gets to exit after its stdin is closed
    pub shutdown_timeout: Duration,
    /// Protocol version announced in `initialize`
    pub protocol_version: String,
    /// Error codes accepted as "method not found" for the unknown-method case
    pub unknown_method_codes: Vec<i64>,
    /// Treat a forced kill during shutdown as a failure instead of a warning
    pub strict_shutdown: bool,
}

impl HarnessConfig {
    pub fn new(command: ServerCommand) -> Self {
        Self {
            command,
            working_dir: None,
            startup_timeout: Duration::from_millis(500),
            request_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            protocol_version: MCP_VERSION.to_string(),
            unknown_method_codes: vec![error_codes::METHOD_NOT_FOUND],
            strict_shutdown: false,
        }
    }
}
