use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// One LED output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedState {
    pub id: u32,
    pub state: bool,
}

/// One hardware button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonState {
    pub id: u32,
    pub pressed: bool,
}

/// Potentiometer reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Potentiometer {
    pub raw: i64,
    pub voltage: f64,
    pub percent: i64,
}

/// Servo position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoState {
    pub angle: i32,
}

/// Last known device state, as carried by one `{"type":"status"}` push.
///
/// Pushes may omit any section, so every part is optional. A snapshot is
/// replaced as a whole on each push and never patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Device uptime in milliseconds at the time of the push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leds: Option<Vec<LedState>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ButtonState>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potentiometer: Option<Potentiometer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servo: Option<ServoState>,
}

impl StatusSnapshot {
    /// Build a snapshot from a status push, one section at a time.
    ///
    /// A section with an unexpected shape is dropped on its own; the rest of
    /// the push still counts.
    pub fn from_record(record: &Value) -> Self {
        Self {
            timestamp: section(record, "timestamp"),
            leds: section(record, "leds"),
            buttons: section(record, "buttons"),
            potentiometer: section(record, "potentiometer"),
            servo: section(record, "servo"),
        }
    }

    /// State of LED `id`, if reported.
    pub fn led(&self, id: u32) -> Option<bool> {
        self.leds
            .as_ref()?
            .iter()
            .find(|led| led.id == id)
            .map(|led| led.state)
    }

    /// Whether button `id` is pressed, if reported.
    pub fn button(&self, id: u32) -> Option<bool> {
        self.buttons
            .as_ref()?
            .iter()
            .find(|button| button.id == id)
            .map(|button| button.pressed)
    }

    /// Servo angle, if reported.
    pub fn servo_angle(&self) -> Option<i32> {
        self.servo.map(|servo| servo.angle)
    }
}

fn section<T: DeserializeOwned>(record: &Value, key: &str) -> Option<T> {
    let value = record.get(key).filter(|value| !value.is_null())?;
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(section = key, error = %err, "dropping status section with unexpected shape");
            None
        }
    }
}

/// A `{"status": ..., "message": ...}` reply from the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn is_error(&self) -> bool {
        self.status == "error"
    }

    /// The greeting a device sends to every new connection.
    pub fn is_challenge(&self) -> bool {
        self.status == crate::handshake::AUTH_CHALLENGE_STATUS
    }
}

/// A parsed device record, classified by its discriminant.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `type == "status"`.
    Status(StatusSnapshot),
    /// Has a string `status` field.
    Reply(Reply),
    /// Anything else, kept verbatim.
    Other(Value),
}

impl Message {
    /// Classify one framed record.
    ///
    /// Any `type == "status"` record is a status push, even when some of its
    /// sections had to be dropped.
    pub fn classify(record: Value) -> Self {
        if record.get("type").and_then(Value::as_str) == Some("status") {
            return Message::Status(StatusSnapshot::from_record(&record));
        }

        if let Some(status) = record.get("status").and_then(Value::as_str) {
            return Message::Reply(Reply {
                status: status.to_string(),
                message: record
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }

        Message::Other(record)
    }
}
