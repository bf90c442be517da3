use std::time::Duration;

use crate::client::ConnectionState;

/// Why an authentication handshake did not succeed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthFailure {
    /// The device answered with a non-success status.
    #[error("rejected by device: {}", .0.as_deref().unwrap_or("no detail"))]
    Rejected(Option<String>),

    /// The first response was not a handshake reply.
    #[error("malformed handshake response: {0}")]
    Malformed(String),

    /// No response arrived in time.
    #[error("no handshake response within {0:?}")]
    Timeout(Duration),

    /// The connection failed or closed during the handshake.
    #[error("connection lost during handshake: {0}")]
    Disconnected(String),
}

impl AuthFailure {
    /// The device-provided message, if the device sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            AuthFailure::Rejected(message) => message.as_deref(),
            _ => None,
        }
    }
}

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// TCP connect failed (refused, timed out, unresolvable).
    #[error("connection failed: {0}")]
    Connection(#[from] devlink_transport::TransportError),

    /// The device did not accept the credential.
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthFailure),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] devlink_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Servo angle outside 0..=180 under the reject policy.
    #[error("servo angle {0} outside 0..=180")]
    InvalidServoAngle(i32),

    /// Operation not allowed in the current lifecycle state.
    #[error("invalid state: expected {expected}, found {actual}")]
    InvalidState {
        expected: ConnectionState,
        actual: ConnectionState,
    },

    /// The connection was closed by the caller while it was being set up.
    #[error("connection closed")]
    Closed,

    /// A background thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ClientError>;
