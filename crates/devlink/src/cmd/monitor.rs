use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use devlink_client::{ClientEvent, ConnectionEvent, EventFilter, ServoPolicy};
use tracing::info;

use crate::cmd::{build_client, parse_duration, MonitorArgs};
use crate::exit::{client_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_snapshot, OutputFormat};

/// How often the loop wakes to check for Ctrl-C and poll deadlines.
const TICK: Duration = Duration::from_millis(200);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let poll = args.poll.as_deref().map(parse_duration).transpose()?;
    let client = build_client(&args.device, ServoPolicy::default())?;
    let (_, events) = client.subscribe_channel(EventFilter::STATUS.and(EventFilter::CONNECTION));

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    client
        .connect()
        .map_err(|err| client_error("connect failed", err))?;
    client.get_status();
    let mut last_poll = Instant::now();

    let label = args.device.label();
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        match events.recv_timeout(TICK) {
            Ok(ClientEvent::StatusUpdated(snapshot)) => {
                print_snapshot(&snapshot, &label, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Ok(ClientEvent::Connection(ConnectionEvent::Disconnected { reason })) => {
                return Err(CliError::new(
                    FAILURE,
                    format!("device disconnected: {reason}"),
                ));
            }
            Ok(_) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(poll) = poll {
            if last_poll.elapsed() >= poll {
                client.get_status();
                last_poll = Instant::now();
            }
        }
    }

    info!(printed, "monitor finished");
    client.close();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
