use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Subcommand, ValueEnum};
use devlink_client::{
    ClientConfig, ClientEvent, ConnectionEvent, DeviceClient, Reply, ServoPolicy, StatusSnapshot,
    DEFAULT_PORT,
};
use tracing::debug;

use crate::exit::{CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_reply, print_sent, OutputFormat};

pub mod led;
pub mod monitor;
pub mod ping;
pub mod servo;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the device's current status.
    Status(StatusArgs),
    /// Stream status updates until interrupted.
    Monitor(MonitorArgs),
    /// Switch one LED, or all of them, on or off.
    Led(LedArgs),
    /// Move the servo.
    Servo(ServoArgs),
    /// Check that the device answers and report the round trip.
    Ping(PingArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Status(args) => status::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Led(args) => led::run(args, format),
        Command::Servo(args) => servo::run(args, format),
        Command::Ping(args) => ping::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where the device is and how to authenticate.
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Device host name or IP address.
    #[arg(long, env = "DEVLINK_HOST")]
    pub host: String,
    /// Device TCP port.
    #[arg(long, env = "DEVLINK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Device password.
    #[arg(long, env = "DEVLINK_PASSWORD", hide_env_values = true)]
    pub password: String,
    /// TCP connect timeout (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub connect_timeout: String,
}

impl DeviceArgs {
    pub fn label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// How long to wait for the status push.
    #[arg(long, default_value = "5s")]
    pub wait: String,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Exit after printing N snapshots.
    #[arg(long)]
    pub count: Option<usize>,
    /// Also request a status push at this interval (e.g. 1s).
    #[arg(long)]
    pub poll: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Switch::On
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedTarget {
    All,
    One(u32),
}

fn parse_led_target(input: &str) -> Result<LedTarget, String> {
    if input.eq_ignore_ascii_case("all") {
        return Ok(LedTarget::All);
    }
    match input.parse::<u32>() {
        Ok(0) | Err(_) => Err(format!(
            "expected `all` or an LED number starting at 1, got `{input}`"
        )),
        Ok(id) => Ok(LedTarget::One(id)),
    }
}

#[derive(Args, Debug)]
pub struct LedArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// LED number (1-based) or `all`.
    #[arg(value_parser = parse_led_target)]
    pub target: LedTarget,
    /// New state.
    pub state: Switch,
    /// Wait this long for the device's reply and print it.
    #[arg(long)]
    pub wait: Option<String>,
}

#[derive(Args, Debug)]
pub struct ServoArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Target angle in degrees (0-180).
    #[arg(allow_negative_numbers = true)]
    pub angle: i32,
    /// Servo index on multi-servo firmware.
    #[arg(long)]
    pub index: Option<u8>,
    /// Refuse out-of-range angles instead of clamping them.
    #[arg(long)]
    pub strict: bool,
    /// Wait this long for the device's reply and print it.
    #[arg(long)]
    pub wait: Option<String>,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// How long to wait for the reply.
    #[arg(long, default_value = "5s")]
    pub wait: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Build an unconnected client, so callers can subscribe first.
pub(crate) fn build_client(device: &DeviceArgs, policy: ServoPolicy) -> CliResult<DeviceClient> {
    let connect_timeout = parse_duration(&device.connect_timeout)?;
    let config = ClientConfig::new(device.host.clone(), device.port, device.password.clone())
        .with_connect_timeout(connect_timeout)
        .with_servo_policy(policy);
    debug!(?config, "client configured");
    Ok(DeviceClient::new(config))
}

/// Next status snapshot, or an error if the session ends or `timeout` passes.
pub(crate) fn wait_for_status(
    rx: &Receiver<ClientEvent>,
    timeout: Duration,
) -> CliResult<Arc<StatusSnapshot>> {
    wait_for(rx, timeout, "status", |event| match event {
        ClientEvent::StatusUpdated(snapshot) => Some(snapshot),
        _ => None,
    })
}

/// Next device reply, or an error if the session ends or `timeout` passes.
pub(crate) fn wait_for_reply(rx: &Receiver<ClientEvent>, timeout: Duration) -> CliResult<Reply> {
    wait_for(rx, timeout, "reply", |event| match event {
        ClientEvent::Reply(reply) => Some(reply),
        _ => None,
    })
}

fn wait_for<T>(
    rx: &Receiver<ClientEvent>,
    timeout: Duration,
    what: &str,
    mut pick: impl FnMut(ClientEvent) -> Option<T>,
) -> CliResult<T> {
    let deadline = Instant::now() + timeout;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(left) {
            Ok(ClientEvent::Connection(ConnectionEvent::Disconnected { reason })) => {
                return Err(CliError::new(
                    FAILURE,
                    format!("device disconnected while waiting for {what}: {reason}"),
                ));
            }
            Ok(event) => {
                if let Some(found) = pick(event) {
                    return Ok(found);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("no {what} from device within {timeout:?}"),
                ));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(CliError::new(FAILURE, format!("event stream ended before {what}")));
            }
        }
    }
}

/// Finish a fire-and-forget command: either confirm the send or wait for
/// the device's reply when asked to.
pub(crate) fn finish_command(
    rx: &Receiver<ClientEvent>,
    command: &str,
    device: &DeviceArgs,
    wait: Option<&str>,
    format: OutputFormat,
) -> CliResult<i32> {
    let Some(wait) = wait else {
        print_sent(command, &device.label(), format);
        return Ok(SUCCESS);
    };

    let reply = wait_for_reply(rx, parse_duration(wait)?)?;
    print_reply(&reply, command, &device.label(), None, format);
    Ok(if reply.is_success() { SUCCESS } else { FAILURE })
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use devlink_client::DisconnectReason;

    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn led_target_accepts_all_or_positive_numbers() {
        assert_eq!(parse_led_target("all"), Ok(LedTarget::All));
        assert_eq!(parse_led_target("ALL"), Ok(LedTarget::All));
        assert_eq!(parse_led_target("3"), Ok(LedTarget::One(3)));
        assert!(parse_led_target("0").is_err());
        assert!(parse_led_target("left").is_err());
    }

    #[test]
    fn wait_for_reply_skips_other_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(ClientEvent::StatusUpdated(Arc::new(StatusSnapshot::default())))
            .unwrap();
        tx.send(ClientEvent::Reply(Reply {
            status: "success".into(),
            message: Some("pong".into()),
        }))
        .unwrap();

        let reply = wait_for_reply(&rx, Duration::from_millis(100)).unwrap();
        assert_eq!(reply.message.as_deref(), Some("pong"));
    }

    #[test]
    fn wait_for_status_reports_disconnect() {
        let (tx, rx) = mpsc::channel();
        tx.send(ClientEvent::Connection(ConnectionEvent::Disconnected {
            reason: DisconnectReason::PeerClosed,
        }))
        .unwrap();

        let err = wait_for_status(&rx, Duration::from_millis(100)).unwrap_err();
        assert_eq!(err.code, FAILURE);
        assert!(err.message.contains("peer closed"));
    }

    #[test]
    fn wait_times_out() {
        let (_tx, rx) = mpsc::channel();
        let err = wait_for_reply(&rx, Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }
}
