use std::fmt;
use std::time::Duration;

use devlink_frame::DEFAULT_MAX_LINE;

use crate::error::{ClientError, Result};
use crate::handshake::HandshakeConfig;

/// Port the device firmware listens on.
pub const DEFAULT_PORT: u16 = 8080;
/// Time allowed for the TCP connect (and for each blocking write).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Time allowed for the authentication response.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Interval between keep-alive pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Floor for the connect and handshake timeouts. Sockets refuse a zero timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);
/// Floor for the keep-alive interval.
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(10);

/// Lowest servo angle the device accepts.
pub const SERVO_MIN_ANGLE: i32 = 0;
/// Highest servo angle the device accepts.
pub const SERVO_MAX_ANGLE: i32 = 180;

/// What to do with a servo angle outside `0..=180`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServoPolicy {
    /// Refuse the command with [`ClientError::InvalidServoAngle`]; nothing is sent.
    Reject,
    /// Clamp into range and send.
    #[default]
    Clamp,
}

impl ServoPolicy {
    /// Apply the policy, returning the angle to put on the wire.
    pub fn apply(self, angle: i32) -> Result<u8> {
        let in_range = (SERVO_MIN_ANGLE..=SERVO_MAX_ANGLE).contains(&angle);
        let angle = match self {
            ServoPolicy::Reject if !in_range => return Err(ClientError::InvalidServoAngle(angle)),
            ServoPolicy::Reject => angle,
            ServoPolicy::Clamp => angle.clamp(SERVO_MIN_ANGLE, SERVO_MAX_ANGLE),
        };
        // In range by construction.
        Ok(angle as u8)
    }
}

/// Connection settings, injected at construction.
///
/// The client never reads or writes a configuration store; remembering the
/// last host or password is up to the embedding application.
#[derive(Clone)]
pub struct ClientConfig {
    /// Device host name or IP address.
    pub host: String,
    /// Device TCP port.
    pub port: u16,
    /// Password sent in the `auth` command. Never logged.
    pub credential: String,
    /// Timeout for the TCP connect and for each blocking write.
    pub connect_timeout: Duration,
    /// Timeout for the authentication response.
    pub handshake_timeout: Duration,
    /// Interval between keep-alive pings while active.
    pub keepalive_interval: Duration,
    /// Handling of out-of-range servo angles.
    pub servo_policy: ServoPolicy,
    /// When set, mutating commands are followed by `get_status` after this
    /// delay. Best-effort: the device may not have applied the change yet.
    pub settle_delay: Option<Duration>,
    /// Longest accepted incoming line in bytes.
    pub max_line_length: usize,
}

impl ClientConfig {
    /// Settings for `host:port` with default timeouts.
    pub fn new(host: impl Into<String>, port: u16, credential: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            credential: credential.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            servo_policy: ServoPolicy::default(),
            settle_delay: None,
            max_line_length: DEFAULT_MAX_LINE,
        }
    }

    /// Raised to [`MIN_TIMEOUT`] if shorter.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout.max(MIN_TIMEOUT);
        self
    }

    /// Raised to [`MIN_TIMEOUT`] if shorter.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout.max(MIN_TIMEOUT);
        self
    }

    /// Raised to [`MIN_KEEPALIVE_INTERVAL`] if shorter.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval.max(MIN_KEEPALIVE_INTERVAL);
        self
    }

    pub fn with_servo_policy(mut self, policy: ServoPolicy) -> Self {
        self.servo_policy = policy;
        self
    }

    pub fn with_settle_delay(mut self, delay: Option<Duration>) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// `host:port` for diagnostics.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Handshake settings derived from this configuration.
    pub fn handshake_config(&self) -> HandshakeConfig {
        HandshakeConfig {
            timeout: self.handshake_timeout,
            credential: self.credential.clone(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "credential",
                &format_args!("<redacted:{} bytes>", self.credential.len()),
            )
            .field("connect_timeout", &self.connect_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("keepalive_interval", &self.keepalive_interval)
            .field("servo_policy", &self.servo_policy)
            .field("settle_delay", &self.settle_delay)
            .field("max_line_length", &self.max_line_length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_policy_limits_angle() {
        assert_eq!(ServoPolicy::Clamp.apply(45).unwrap(), 45);
        assert_eq!(ServoPolicy::Clamp.apply(200).unwrap(), 180);
        assert_eq!(ServoPolicy::Clamp.apply(-10).unwrap(), 0);
    }

    #[test]
    fn reject_policy_refuses_out_of_range() {
        assert_eq!(ServoPolicy::Reject.apply(0).unwrap(), 0);
        assert_eq!(ServoPolicy::Reject.apply(180).unwrap(), 180);
        assert!(matches!(
            ServoPolicy::Reject.apply(200),
            Err(ClientError::InvalidServoAngle(200))
        ));
        assert!(matches!(
            ServoPolicy::Reject.apply(-1),
            Err(ClientError::InvalidServoAngle(-1))
        ));
    }

    #[test]
    fn defaults_match_firmware() {
        let cfg = ClientConfig::new("192.168.4.1", DEFAULT_PORT, "pw");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.keepalive_interval, Duration::from_secs(25));
        assert_eq!(cfg.servo_policy, ServoPolicy::Clamp);
        assert!(cfg.settle_delay.is_none());
        assert_eq!(cfg.address(), "192.168.4.1:8080");
    }

    #[test]
    fn zero_durations_are_floored() {
        let cfg = ClientConfig::new("host", 1, "pw")
            .with_connect_timeout(Duration::ZERO)
            .with_handshake_timeout(Duration::ZERO)
            .with_keepalive_interval(Duration::ZERO);
        assert_eq!(cfg.connect_timeout, MIN_TIMEOUT);
        assert_eq!(cfg.handshake_timeout, MIN_TIMEOUT);
        assert_eq!(cfg.keepalive_interval, MIN_KEEPALIVE_INTERVAL);

        let cfg = cfg.with_keepalive_interval(Duration::from_millis(250));
        assert_eq!(cfg.keepalive_interval, Duration::from_millis(250));
    }

    #[test]
    fn debug_output_redacts_credential() {
        let cfg = ClientConfig::new("host", 1, "super-secret");
        let debug = format!("{cfg:?}");
        assert!(debug.contains("<redacted:12 bytes>"));
        assert!(!debug.contains("super-secret"));
    }
}
