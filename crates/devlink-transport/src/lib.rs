//! TCP transport for talking to a networked device.
//!
//! This is the lowest layer of devlink. It owns the socket and offers
//! connect-with-timeout, whole-buffer send, blocking receive and an
//! idempotent close that unblocks any receive in progress on another thread.
//! Everything else builds on the [`TcpTransport`] handle provided here.

pub mod error;
pub mod tcp;

pub use error::{Result, TransportError};
pub use tcp::TcpTransport;
