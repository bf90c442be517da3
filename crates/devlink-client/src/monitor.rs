//! Background reader: drains the socket, keeps the snapshot current and
//! publishes what it reads.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use devlink_frame::{FrameError, LineReader};
use devlink_transport::TcpTransport;
use serde_json::Value;
use tracing::{debug, warn};

use crate::events::{ClientEvent, DisconnectReason};
use crate::message::Message;
use crate::session::Shared;

pub(crate) const THREAD_NAME: &str = "devlink-monitor";

/// Start the monitor on `reader`, which may already hold records queued
/// behind the handshake response.
pub(crate) fn spawn(
    shared: Arc<Shared>,
    reader: LineReader<TcpTransport>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || run(&shared, reader))
}

fn run(shared: &Shared, mut reader: LineReader<TcpTransport>) {
    debug!("monitor started");
    let reason = loop {
        if !shared.is_running() {
            break DisconnectReason::ClosedByCaller;
        }

        match reader.read_record() {
            Ok(record) => handle_record(shared, record),
            Err(_) if !shared.is_running() => break DisconnectReason::ClosedByCaller,
            Err(FrameError::ConnectionClosed) => break DisconnectReason::PeerClosed,
            Err(err) => {
                warn!(error = %err, "monitor read failed");
                break DisconnectReason::Io(err.to_string());
            }
        }
    };

    shared.shutdown();
    shared.publish_disconnected(reason);
    debug!(dropped = reader.framer().dropped(), "monitor stopped");
}

fn handle_record(shared: &Shared, record: Value) {
    match Message::classify(record) {
        Message::Status(snapshot) => {
            let snapshot = shared.replace_snapshot(snapshot);
            shared.bus.publish(ClientEvent::StatusUpdated(snapshot));
        }
        Message::Reply(reply) => {
            if reply.is_error() {
                warn!(message = ?reply.message, "device reported an error");
            } else {
                debug!(status = %reply.status, message = ?reply.message, "device reply");
            }
            shared.bus.publish(ClientEvent::Reply(reply));
        }
        Message::Other(value) => debug!(record = %value, "unhandled record"),
    }
}
