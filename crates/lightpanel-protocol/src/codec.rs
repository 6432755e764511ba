//! Line-based codec for the panel serial link.
//!
//! The panel terminates every line it sends with `\n` (the Arduino side
//! usually sends `\r\n`). Outgoing commands are terminated with a single `\n`.

use bytes::BytesMut;

/// Maximum line length accepted from the panel before the buffer is flushed.
pub const MAX_LINE_LENGTH: usize = 256;

/// Line terminator appended to outgoing commands.
pub const LINE_TERMINATOR: u8 = b'\n';

/// A codec for reading and writing panel lines.
///
/// Received bytes are accumulated until a line terminator (`\n` or `\r`) is
/// seen. Empty lines, such as the gap between `\r` and `\n`, are skipped.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH * 2),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// Returns `None` if more data is needed. A line longer than
    /// [`MAX_LINE_LENGTH`] is returned in chunks of at most that size, whether
    /// or not its terminator has arrived yet.
    pub fn decode_line(&mut self) -> Option<String> {
        loop {
            let line_end = self
                .buffer
                .iter()
                .position(|&byte| byte == b'\r' || byte == b'\n');

            if line_end.unwrap_or(self.buffer.len()) > MAX_LINE_LENGTH {
                log::warn!(
                    "discarding framing: more than {} bytes received without a line terminator",
                    MAX_LINE_LENGTH
                );
                let overflow = self.buffer.split_to(MAX_LINE_LENGTH);
                return Some(String::from_utf8_lossy(&overflow).to_string());
            }

            let Some(end) = line_end else {
                return None;
            };

            let line_data = self.buffer.split_to(end);

            // Skip the terminator character(s)
            while !self.buffer.is_empty() && (self.buffer[0] == b'\r' || self.buffer[0] == b'\n') {
                let _ = self.buffer.split_to(1);
            }

            if !line_data.is_empty() {
                return Some(String::from_utf8_lossy(&line_data).to_string());
            }
        }
    }

    /// Encode a command line for transmission.
    ///
    /// Appends the `\n` terminator.
    pub fn encode_line(line: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(LINE_TERMINATOR);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard anything buffered, e.g. after the link is reopened.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
