use std::fmt;
use std::net::SocketAddr;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use devlink_frame::LineReader;
use devlink_transport::TcpTransport;
use tracing::{info, warn};

use crate::config::{ClientConfig, MIN_TIMEOUT};
use crate::dispatcher::CommandDispatcher;
use crate::error::{AuthFailure, ClientError, Result};
use crate::events::{
    ClientEvent, ConnectionEvent, DisconnectReason, EventBus, EventFilter, SubscriptionId,
};
use crate::handshake::{authenticate, HandshakeResult};
use crate::message::StatusSnapshot;
use crate::session::Shared;
use crate::{keepalive, monitor};

/// Upper bound on one blocking read during the handshake, so the deadline
/// is checked regularly.
const HANDSHAKE_POLL: Duration = Duration::from_millis(100);

/// Lifecycle of a client's single connection.
///
/// States only move forward: `Idle -> Connecting -> Authenticating ->
/// Active -> Closed`, with any state able to jump to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Authenticating,
    Active,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Active => "active",
            ConnectionState::Closed => "closed",
        })
    }
}

/// A client for one device connection.
///
/// `connect` may be called once. After the session ends, for any reason,
/// the client stays closed; reconnecting means building a new client.
/// Dropping the client closes it.
pub struct DeviceClient {
    config: ClientConfig,
    shared: Arc<Shared>,
    dispatcher: CommandDispatcher,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DeviceClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_event_bus(config, EventBus::new())
    }

    /// Build a client that publishes onto an existing bus.
    pub fn with_event_bus(config: ClientConfig, bus: EventBus) -> Self {
        let shared = Shared::new(bus);
        let dispatcher = CommandDispatcher::new(Arc::clone(&shared), &config);
        Self {
            config,
            shared,
            dispatcher,
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    /// The most recent status snapshot, if one has arrived.
    pub fn snapshot(&self) -> Option<Arc<StatusSnapshot>> {
        self.shared.snapshot()
    }

    /// Address of the device once connected.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.transport().map(TcpTransport::peer_addr)
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.bus
    }

    /// See [`EventBus::subscribe`].
    pub fn subscribe<F>(&self, filter: EventFilter, callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(ClientEvent) + Send + 'static,
    {
        self.shared.bus.subscribe(filter, callback)
    }

    /// See [`EventBus::subscribe_channel`].
    pub fn subscribe_channel(&self, filter: EventFilter) -> (SubscriptionId, Receiver<ClientEvent>) {
        self.shared.bus.subscribe_channel(filter)
    }

    /// Subscribe to lifecycle transitions only.
    pub fn on_connection<F>(&self, mut callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(ConnectionEvent) + Send + 'static,
    {
        self.subscribe(EventFilter::CONNECTION, move |event| {
            if let ClientEvent::Connection(event) = event {
                callback(event);
            }
        })
    }

    /// Subscribe to status updates only.
    pub fn on_status<F>(&self, mut callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(Arc<StatusSnapshot>) + Send + 'static,
    {
        self.subscribe(EventFilter::STATUS, move |event| {
            if let ClientEvent::StatusUpdated(snapshot) = event {
                callback(snapshot);
            }
        })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.bus.unsubscribe(id)
    }

    /// A cloneable handle for issuing commands from other threads.
    pub fn commands(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn set_led(&self, led: u32, state: bool) -> bool {
        self.dispatcher.set_led(led, state)
    }

    pub fn set_all_leds(&self, state: bool) -> bool {
        self.dispatcher.set_all_leds(state)
    }

    pub fn set_servo(&self, angle: i32) -> Result<bool> {
        self.dispatcher.set_servo(angle)
    }

    pub fn set_servo_at(&self, index: u8, angle: i32) -> Result<bool> {
        self.dispatcher.set_servo_at(index, angle)
    }

    pub fn get_status(&self) -> bool {
        self.dispatcher.get_status()
    }

    pub fn ping(&self) -> bool {
        self.dispatcher.ping()
    }

    pub fn request_status_after(&self, delay: Duration) -> bool {
        self.dispatcher.request_status_after(delay)
    }

    /// Connect, authenticate and start the background loops.
    ///
    /// Returns once the session is active. A TCP failure returns
    /// [`ClientError::Connection`]; a failed handshake closes the socket,
    /// publishes [`ConnectionEvent::AuthFailed`] and returns
    /// [`ClientError::Authentication`].
    pub fn connect(&self) -> Result<()> {
        self.shared
            .transition(ConnectionState::Idle, ConnectionState::Connecting)?;
        info!(addr = %self.config.address(), "connecting");

        let transport = match TcpTransport::connect(
            &self.config.host,
            self.config.port,
            self.config.connect_timeout.max(MIN_TIMEOUT),
        ) {
            Ok(transport) => transport,
            Err(err) => {
                warn!(addr = %self.config.address(), error = %err, "connect failed");
                self.shared.shutdown();
                return Err(err.into());
            }
        };

        self.shared.install_transport(transport.clone());
        if self
            .shared
            .transition(ConnectionState::Connecting, ConnectionState::Authenticating)
            .is_err()
        {
            // close() ran while the connect was in flight.
            transport.close();
            return Err(ClientError::Closed);
        }

        let (reader, handshake) = match self.handshake(&transport) {
            Ok(done) => done,
            Err(failure) => return Err(self.fail_handshake(failure)),
        };

        if let Err(err) = transport.set_read_timeout(None) {
            self.shared.shutdown();
            return Err(err.into());
        }
        if self.shared.activate().is_err() {
            transport.close();
            return Err(ClientError::Closed);
        }
        info!(
            peer = %transport.peer_addr(),
            challenges_skipped = handshake.challenges_skipped,
            "session active"
        );
        self.shared
            .bus
            .publish(ClientEvent::Connection(ConnectionEvent::Connected));

        self.start_workers(reader)
    }

    /// End the session and wait for the background loops to stop.
    ///
    /// Safe to call from any thread, repeatedly, and from inside an event
    /// callback. A blocked read is interrupted by shutting the socket down.
    pub fn close(&self) {
        self.shared.shutdown();

        let workers = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let current = thread::current().id();
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("background thread panicked");
            }
        }
    }

    fn handshake(
        &self,
        transport: &TcpTransport,
    ) -> std::result::Result<(LineReader<TcpTransport>, HandshakeResult), AuthFailure> {
        let poll = self.config.handshake_timeout.clamp(MIN_TIMEOUT, HANDSHAKE_POLL);
        let prepare = transport
            .set_write_timeout(Some(self.config.connect_timeout.max(MIN_TIMEOUT)))
            .and_then(|()| transport.set_read_timeout(Some(poll)));
        if let Err(err) = prepare {
            return Err(AuthFailure::Disconnected(err.to_string()));
        }

        let mut reader =
            LineReader::with_max_line(transport.clone(), self.config.max_line_length);
        let mut writer = transport.clone();
        let result = authenticate(&mut reader, &mut writer, &self.config.handshake_config())?;
        Ok((reader, result))
    }

    fn fail_handshake(&self, failure: AuthFailure) -> ClientError {
        if !self.shared.shutdown() {
            // Closed by the caller mid-handshake; nothing to report.
            return ClientError::Closed;
        }
        warn!(error = %failure, "authentication failed");
        self.shared
            .bus
            .publish(ClientEvent::Connection(ConnectionEvent::AuthFailed {
                message: failure.server_message().map(str::to_string),
                reason: failure.to_string(),
            }));
        ClientError::Authentication(failure)
    }

    fn start_workers(&self, reader: LineReader<TcpTransport>) -> Result<()> {
        let mut workers = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let spawned = monitor::spawn(Arc::clone(&self.shared), reader)
            .map_err(|source| (monitor::THREAD_NAME, source))
            .and_then(|handle| {
                workers.push(handle);
                keepalive::spawn(self.dispatcher.clone(), self.config.keepalive_interval)
                    .map_err(|source| (keepalive::THREAD_NAME, source))
            });

        match spawned {
            Ok(handle) => {
                workers.push(handle);
                Ok(())
            }
            Err((name, source)) => {
                self.shared.shutdown();
                self.shared
                    .publish_disconnected(DisconnectReason::Io(format!("failed to spawn {name}")));
                Err(ClientError::Spawn { name, source })
            }
        }
    }
}

impl Drop for DeviceClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for DeviceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceClient")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(ConnectionState::Idle.to_string(), "idle");
        assert_eq!(ConnectionState::Active.to_string(), "active");
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
    }

    #[test]
    fn close_before_connect_is_harmless() {
        let client = DeviceClient::new(ClientConfig::new("127.0.0.1", 1, "pw"));
        client.close();
        client.close();
        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(matches!(
            client.connect(),
            Err(ClientError::InvalidState {
                expected: ConnectionState::Idle,
                actual: ConnectionState::Closed
            })
        ));
    }

    #[test]
    fn debug_output_redacts_credential() {
        let client = DeviceClient::new(ClientConfig::new("host", 8080, "hunter2"));
        let debug = format!("{client:?}");
        assert!(debug.contains("<redacted:7 bytes>"));
        assert!(!debug.contains("hunter2"));
    }
}
