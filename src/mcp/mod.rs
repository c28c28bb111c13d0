/// MCP protocol definitions
///
/// This module holds the JSON-RPC message shapes the harness sends to and
/// parses from a server under test.

pub mod protocol;

// Re-export main types
pub use protocol::*;
