use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::command::Command;
use crate::config::{ClientConfig, ServoPolicy};
use crate::error::Result;
use crate::session::Shared;

/// Fire-and-forget command senders.
///
/// No operation waits for an acknowledgment. A command issued while the
/// session is not active, or whose write fails, is logged and dropped;
/// the returned `bool` only says whether the bytes reached the socket.
#[derive(Clone)]
pub struct CommandDispatcher {
    shared: Arc<Shared>,
    servo_policy: ServoPolicy,
    settle_delay: Option<Duration>,
}

impl CommandDispatcher {
    pub(crate) fn new(shared: Arc<Shared>, config: &ClientConfig) -> Self {
        Self {
            shared,
            servo_policy: config.servo_policy,
            settle_delay: config.settle_delay,
        }
    }

    pub(crate) fn session(&self) -> &Shared {
        &self.shared
    }

    /// Set LED `led` (1-based) on or off.
    pub fn set_led(&self, led: u32, state: bool) -> bool {
        self.send(&Command::SetLed { led, state })
    }

    pub fn set_all_leds(&self, state: bool) -> bool {
        self.send(&Command::SetAllLeds { state })
    }

    /// Move the servo.
    ///
    /// Angles outside `0..=180` are clamped or rejected according to the
    /// configured [`ServoPolicy`]; a rejected angle sends nothing.
    pub fn set_servo(&self, angle: i32) -> Result<bool> {
        let angle = self.servo_policy.apply(angle)?;
        Ok(self.send(&Command::SetServo {
            servo_index: None,
            angle,
        }))
    }

    /// Move servo `index` on multi-servo firmware.
    pub fn set_servo_at(&self, index: u8, angle: i32) -> Result<bool> {
        let angle = self.servo_policy.apply(angle)?;
        Ok(self.send(&Command::SetServo {
            servo_index: Some(index),
            angle,
        }))
    }

    /// Ask the device to push a status record.
    pub fn get_status(&self) -> bool {
        self.send(&Command::GetStatus)
    }

    pub fn ping(&self) -> bool {
        self.send(&Command::Ping)
    }

    /// Send `get_status` after `delay`, if the session is still active then.
    ///
    /// Best-effort: the device may not have applied a preceding change by
    /// the time it answers. Returns `false` if the helper thread could not
    /// be started.
    pub fn request_status_after(&self, delay: Duration) -> bool {
        let dispatcher = self.clone();
        let spawned = thread::Builder::new()
            .name("devlink-settle".to_string())
            .spawn(move || {
                if dispatcher.shared.stop.wait_timeout(delay) {
                    return;
                }
                dispatcher.get_status();
            });

        match spawned {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "failed to schedule status refresh");
                false
            }
        }
    }

    /// Write one command if the session is active. Never fails loudly.
    pub fn send(&self, command: &Command) -> bool {
        if !self.shared.is_active() {
            debug!(command = command.name(), state = %self.shared.state(), "session not active, command dropped");
            return false;
        }

        if let Err(err) = self.shared.send(command) {
            warn!(command = command.name(), error = %err, "failed to send command");
            return false;
        }
        debug!(command = command.name(), "command sent");

        if command.is_mutating() {
            if let Some(delay) = self.settle_delay {
                self.request_status_after(delay);
            }
        }
        true
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("servo_policy", &self.servo_policy)
            .field("settle_delay", &self.settle_delay)
            .finish()
    }
}
