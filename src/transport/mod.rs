/// Stdio transport between the harness and the server under test

pub mod framing;
pub mod stdio;

pub use framing::{LineBuffer, StdoutEvent};
pub use stdio::{Outcome, StdioTransport, TransportError};
