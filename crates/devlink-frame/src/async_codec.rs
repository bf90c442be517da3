//! `tokio_util` codec with the same framing rules as [`LineFramer`].

use bytes::BytesMut;
use serde::Serialize;
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_line, LineFramer, DEFAULT_MAX_LINE};
use crate::error::FrameError;

/// Newline-delimited JSON codec for `FramedRead` / `FramedWrite`.
///
/// Decoding yields every valid record; malformed, blank and oversized lines
/// are skipped exactly as the synchronous framer does.
#[derive(Debug)]
pub struct LineCodec {
    framer: LineFramer,
}

impl LineCodec {
    /// Create a codec with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }

    /// Create a codec with an explicit line limit.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            framer: LineFramer::with_max_line(max_line),
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = Value;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Value>, FrameError> {
        if !src.is_empty() {
            let chunk = src.split();
            self.framer.push(&chunk);
        }
        Ok(self.framer.next_record())
    }
}

impl<T: Serialize> Encoder<T> for LineCodec {
    type Error = FrameError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_line(&item, dst)
    }
}
