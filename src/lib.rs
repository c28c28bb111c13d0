/// Public library interface for the MCP Forge compliance harness
///
/// The harness launches an MCP server as a child process, drives it through
/// a fixed JSON-RPC conversation over stdio, and reports a verdict per case.
/// The static validator checks a generated server project on disk and
/// reports in the same shape.

use thiserror::Error;

pub mod config;
pub mod harness;
pub mod mcp;
pub mod process;
pub mod report;
pub mod transport;
pub mod validator;

// Re-export the types most callers need
pub use config::{HarnessConfig, ServerCommand};
pub use harness::{run_test_suite, TestCase};
pub use report::{OutputFormat, RunReport, Verdict, VerdictStatus};
pub use validator::ValidationReport;

/// Errors that stop a run before any verdict exists
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("invalid server command `{command}`: {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
