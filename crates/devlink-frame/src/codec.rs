use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;

/// Record delimiter.
pub const DELIMITER: u8 = b'\n';

/// Default maximum length of a single line: 64 KiB.
///
/// Device status pushes are a few hundred bytes; anything near this size is
/// a misbehaving peer.
pub const DEFAULT_MAX_LINE: usize = 64 * 1024;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Split the next complete line off the front of `src`.
///
/// Returns `None` if `src` holds no delimiter yet; the partial line stays in
/// the buffer. The delimiter and a trailing `\r` are not part of the result.
pub fn decode_line(src: &mut BytesMut) -> Option<Bytes> {
    let pos = src.iter().position(|b| *b == DELIMITER)?;
    let mut line = src.split_to(pos + 1);
    line.truncate(pos);
    if line.last() == Some(&b'\r') {
        line.truncate(pos - 1);
    }
    Some(line.freeze())
}

/// Encode a value as one wire record.
///
/// Wire format:
/// ```text
/// ┌──────────────────────────────┬──────┐
/// │ compact JSON (UTF-8)         │ "\n" │
/// └──────────────────────────────┴──────┘
/// ```
///
/// Compact `serde_json` output escapes newlines inside strings, so the
/// delimiter can only appear once, at the end.
pub fn encode_line<T: Serialize + ?Sized>(value: &T, dst: &mut BytesMut) -> Result<()> {
    let payload = serde_json::to_vec(value)?;
    dst.reserve(payload.len() + 1);
    dst.put_slice(&payload);
    dst.put_u8(DELIMITER);
    Ok(())
}

/// Incremental line framer.
///
/// Feed it byte chunks in arrival order; it emits every complete record and
/// keeps the trailing partial line for the next chunk. The framer is pure:
/// it performs no I/O and never blocks.
#[derive(Debug)]
pub struct LineFramer {
    buf: BytesMut,
    max_line: usize,
    /// Set after an oversized partial line was discarded; the rest of that
    /// line is skipped up to the next delimiter.
    discarding: bool,
    dropped: u64,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    /// Create a framer with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }

    /// Create a framer with an explicit line limit.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_line,
            discarding: false,
            dropped: 0,
        }
    }

    /// Append a chunk and return every record it completed, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.push(chunk);
        std::iter::from_fn(|| self.next_record()).collect()
    }

    /// Append a chunk without extracting records.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Extract the next complete, valid record from the buffered bytes.
    pub fn next_record(&mut self) -> Option<Value> {
        loop {
            if self.discarding {
                match self.buf.iter().position(|b| *b == DELIMITER) {
                    Some(pos) => {
                        self.buf.advance(pos + 1);
                        self.discarding = false;
                    }
                    None => {
                        self.buf.clear();
                        return None;
                    }
                }
            }

            let Some(line) = decode_line(&mut self.buf) else {
                if self.buf.len() > self.max_line {
                    warn!(
                        buffered = self.buf.len(),
                        max = self.max_line,
                        "discarding oversized partial line"
                    );
                    self.buf.clear();
                    self.discarding = true;
                    self.dropped += 1;
                }
                return None;
            };

            if line.len() > self.max_line {
                warn!(len = line.len(), max = self.max_line, "dropping oversized line");
                self.dropped += 1;
                continue;
            }

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match serde_json::from_slice::<Value>(&line) {
                Ok(value) => return Some(value),
                Err(err) => {
                    warn!(len = line.len(), error = %err, "dropping malformed record");
                    debug!(line = %String::from_utf8_lossy(&line), "malformed record content");
                    self.dropped += 1;
                }
            }
        }
    }

    /// Bytes currently held for an incomplete line.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Number of lines dropped so far (malformed or oversized).
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Configured line limit.
    pub fn max_line(&self) -> usize {
        self.max_line
    }
}
