use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace};

use crate::config::MIN_KEEPALIVE_INTERVAL;
use crate::dispatcher::CommandDispatcher;

pub(crate) const THREAD_NAME: &str = "devlink-keepalive";

/// Ping every `interval` while the session stays active.
///
/// The wait is interrupted by shutdown, so the loop ends promptly after
/// `close()` without sending another ping. Intervals below
/// [`MIN_KEEPALIVE_INTERVAL`] are raised to it.
pub(crate) fn spawn(
    dispatcher: CommandDispatcher,
    interval: Duration,
) -> io::Result<JoinHandle<()>> {
    let interval = interval.max(MIN_KEEPALIVE_INTERVAL);
    thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || run(&dispatcher, interval))
}

fn run(dispatcher: &CommandDispatcher, interval: Duration) {
    debug!(?interval, "keep-alive started");
    loop {
        if dispatcher.session().stop.wait_timeout(interval) {
            break;
        }
        let session = dispatcher.session();
        if !session.is_running() || !session.is_active() {
            break;
        }
        trace!("keep-alive ping");
        dispatcher.ping();
    }
    debug!("keep-alive stopped");
}
