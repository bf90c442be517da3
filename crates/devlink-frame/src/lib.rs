//! Newline-delimited JSON framing.
//!
//! Every record on the wire is one compact JSON document followed by `\n`.
//! There is no length prefix, so the framer keeps a residual buffer and
//! only ever hands out complete lines:
//! - records split across reads are reassembled
//! - several records in one read are all emitted, in order
//! - lines that are not valid JSON are dropped and framing continues
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{decode_line, encode_line, LineFramer, DEFAULT_MAX_LINE, DELIMITER};
pub use error::{FrameError, Result};
pub use reader::LineReader;

#[cfg(feature = "async")]
pub use async_codec::LineCodec;
