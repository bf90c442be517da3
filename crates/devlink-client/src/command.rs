use std::fmt;

use bytes::BytesMut;
use devlink_frame::encode_line;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A request to the device. The `command` field selects the verb.
///
/// Commands are fire-and-forget: no reply is matched back to the command
/// that caused it.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Authenticate the session.
    Auth { password: String },
    /// Set one LED output. `led` is 1-based.
    SetLed { led: u32, state: bool },
    /// Set every LED output.
    SetAllLeds { state: bool },
    /// Move a servo. `servo_index` addresses multi-servo firmware.
    SetServo {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        servo_index: Option<u8>,
        angle: u8,
    },
    /// Request a status push.
    GetStatus,
    /// Liveness probe.
    Ping,
}

impl Command {
    /// Wire name of the verb.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Auth { .. } => "auth",
            Command::SetLed { .. } => "set_led",
            Command::SetAllLeds { .. } => "set_all_leds",
            Command::SetServo { .. } => "set_servo",
            Command::GetStatus => "get_status",
            Command::Ping => "ping",
        }
    }

    /// Whether the command changes device outputs.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::SetLed { .. } | Command::SetAllLeds { .. } | Command::SetServo { .. }
        )
    }

    /// Append the framed wire record to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        encode_line(self, dst)?;
        Ok(())
    }

    /// The framed wire record as bytes.
    pub fn to_line(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(64);
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Auth { password } => f
                .debug_struct("Auth")
                .field("password", &format_args!("<redacted:{} bytes>", password.len()))
                .finish(),
            Command::SetLed { led, state } => f
                .debug_struct("SetLed")
                .field("led", led)
                .field("state", state)
                .finish(),
            Command::SetAllLeds { state } => {
                f.debug_struct("SetAllLeds").field("state", state).finish()
            }
            Command::SetServo { servo_index, angle } => f
                .debug_struct("SetServo")
                .field("servo_index", servo_index)
                .field("angle", angle)
                .finish(),
            Command::GetStatus => f.write_str("GetStatus"),
            Command::Ping => f.write_str("Ping"),
        }
    }
}
