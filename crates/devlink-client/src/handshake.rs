use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use devlink_frame::{FrameError, LineReader};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::config::DEFAULT_HANDSHAKE_TIMEOUT;
use crate::error::AuthFailure;
use crate::message::Message;

/// Status of the greeting a device sends to each new connection before
/// any command, e.g. `{"status":"auth_required","message":"Send authentication: ..."}`.
pub const AUTH_CHALLENGE_STATUS: &str = "auth_required";

/// Configuration for the authentication handshake.
#[derive(Clone)]
pub struct HandshakeConfig {
    /// Deadline for the response, measured from sending `auth`.
    pub timeout: Duration,
    /// Password sent to the device. Never logged.
    pub credential: String,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            credential: String::new(),
        }
    }
}

impl fmt::Debug for HandshakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeConfig")
            .field("timeout", &self.timeout)
            .field(
                "credential",
                &format_args!("<redacted:{} bytes>", self.credential.len()),
            )
            .finish()
    }
}

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    /// Message that accompanied the success reply, if any.
    pub message: Option<String>,
    /// Greeting challenges skipped before the response.
    pub challenges_skipped: usize,
}

/// Send `auth` and wait for the device's verdict.
///
/// The first reply that is not a greeting challenge is the response:
/// `status == "success"` authenticates, any other status is a rejection,
/// and a non-reply record is malformed. Records that arrived behind the
/// response stay queued in `reader` for whoever reads next.
///
/// The deadline holds even against a peer that keeps talking without
/// answering: junk and partial lines do not extend it. The reader's stream
/// should carry a short read timeout, since one blocked read can overrun
/// the deadline by that much.
pub fn authenticate<R: Read, W: Write>(
    reader: &mut LineReader<R>,
    writer: &mut W,
    config: &HandshakeConfig,
) -> Result<HandshakeResult, AuthFailure> {
    let auth = Command::Auth {
        password: config.credential.clone(),
    };
    let line = auth
        .to_line()
        .map_err(|err| AuthFailure::Malformed(err.to_string()))?;
    writer
        .write_all(&line)
        .and_then(|()| writer.flush())
        .map_err(|err| AuthFailure::Disconnected(format!("sending auth failed: {err}")))?;
    debug!("auth command sent");

    let deadline = Instant::now() + config.timeout;
    let mut challenges_skipped = 0usize;

    loop {
        if Instant::now() >= deadline {
            return Err(AuthFailure::Timeout(config.timeout));
        }

        let record = match reader.read_record_until(deadline) {
            Ok(record) => record,
            Err(FrameError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(FrameError::ConnectionClosed) => {
                return Err(AuthFailure::Disconnected(
                    "connection closed during handshake".to_string(),
                ));
            }
            Err(err) => return Err(AuthFailure::Disconnected(err.to_string())),
        };

        match Message::classify(record) {
            Message::Reply(reply) if reply.is_challenge() => {
                debug!("skipping authentication challenge");
                challenges_skipped += 1;
            }
            Message::Reply(reply) if reply.is_success() => {
                info!("authenticated");
                return Ok(HandshakeResult {
                    message: reply.message,
                    challenges_skipped,
                });
            }
            Message::Reply(reply) => {
                warn!(status = %reply.status, message = ?reply.message, "authentication rejected");
                return Err(AuthFailure::Rejected(reply.message));
            }
            Message::Status(_) => {
                return Err(AuthFailure::Malformed(
                    "status push received before handshake reply".to_string(),
                ));
            }
            Message::Other(value) => {
                return Err(AuthFailure::Malformed(format!(
                    "unexpected record {value}"
                )));
            }
        }
    }
}
