/// Newline framing for the server's stdout
///
/// A reader task pulls raw bytes off the pipe, feeds them through a
/// [`LineBuffer`], and forwards every complete line over a channel. The task
/// never waits on the receiving side, so the pipe keeps draining no matter
/// what the harness is doing.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const READ_CHUNK: usize = 8 * 1024;

/// Upper bound on a single unterminated line before it is flushed as oversized
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Something that happened on the server's stdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdoutEvent {
    /// A complete line with its terminator (and any `\r`) stripped
    Line(String),
    /// Bytes left over when the stream ended without a final newline
    Partial(String),
    /// A line grew past [`MAX_LINE_BYTES`] without a newline
    Oversized(usize),
    /// The stream failed; no further events follow
    ReadError(String),
    /// End of stream; no further events follow
    Closed,
}

/// Accumulates bytes until full newline-terminated lines are available
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Number of buffered bytes not yet terminated by a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take whatever is left once the stream has ended
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Drain `reader` into `events` until EOF, an error, or the receiver is gone
pub async fn read_lines<R>(mut reader: R, events: mpsc::UnboundedSender<StdoutEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buffer = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => {
                if let Some(rest) = buffer.finish() {
                    if !rest.trim().is_empty() {
                        let _ = events.send(StdoutEvent::Partial(rest));
                    }
                }
                debug!("server stdout closed");
                let _ = events.send(StdoutEvent::Closed);
                return;
            }
            Ok(n) => {
                for line in buffer.push(&chunk[..n]) {
                    if events.send(StdoutEvent::Line(line)).is_err() {
                        return;
                    }
                }
                if buffer.pending_len() > MAX_LINE_BYTES {
                    let size = buffer.pending_len();
                    warn!(size, "server stdout line exceeds limit, discarding");
                    buffer.finish();
                    if events.send(StdoutEvent::Oversized(size)).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to read server stdout");
                let _ = events.send(StdoutEvent::ReadError(e.to_string()));
                return;
            }
        }
    }
}
