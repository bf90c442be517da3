use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::time::Instant;

use serde_json::Value;

use crate::codec::{LineFramer, DEFAULT_MAX_LINE};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete JSON records from any `Read` stream.
///
/// One read may complete several records; the extras are queued and handed
/// out by later calls before the stream is touched again. This lets one
/// consumer (a handshake) take the first record and pass the reader, with
/// everything that arrived behind it, on to another (a monitor loop).
pub struct LineReader<T> {
    inner: T,
    framer: LineFramer,
    pending: VecDeque<Value>,
}

impl<T: Read> LineReader<T> {
    /// Create a new line reader with the default line limit.
    pub fn new(inner: T) -> Self {
        Self::with_max_line(inner, DEFAULT_MAX_LINE)
    }

    /// Create a new line reader with an explicit line limit.
    pub fn with_max_line(inner: T, max_line: usize) -> Self {
        Self {
            inner,
            framer: LineFramer::with_max_line(max_line),
            pending: VecDeque::new(),
        }
    }

    /// Read the next complete record (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. A
    /// partial line left at EOF is discarded. Read timeouts surface as
    /// `FrameError::Io` with kind `WouldBlock` or `TimedOut`; the reader
    /// stays usable afterwards.
    pub fn read_record(&mut self) -> Result<Value> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Ok(record);
            }
            self.fill()?;
        }
    }

    /// Like [`read_record`](Self::read_record), but gives up once `deadline`
    /// has passed with no complete record.
    ///
    /// The deadline is checked between reads, so a peer that keeps sending
    /// junk or a never-ending partial line cannot hold the caller past it.
    /// Expiry surfaces as `FrameError::Io` with kind `TimedOut`. A single
    /// blocking read may still overrun the deadline by up to the stream's
    /// own read timeout.
    pub fn read_record_until(&mut self, deadline: Instant) -> Result<Value> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Ok(record);
            }
            if Instant::now() >= deadline {
                return Err(FrameError::Io(io::Error::from(ErrorKind::TimedOut)));
            }
            self.fill()?;
        }
    }

    /// One read from the stream, framing whatever arrived.
    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = match self.inner.read(&mut chunk) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => return Ok(()),
            Err(err) => return Err(FrameError::Io(err)),
        };

        if read == 0 {
            return Err(FrameError::ConnectionClosed);
        }

        self.pending.extend(self.framer.feed(&chunk[..read]));
        Ok(())
    }

    /// Records already framed but not yet returned.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Borrow the framer (for diagnostics such as the dropped-line count).
    pub fn framer(&self) -> &LineFramer {
        &self.framer
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}
