//! Event delivery to consumers.
//!
//! Every subscriber owns an unbounded queue. Publishing only pushes onto
//! those queues, so the thread that publishes (usually the monitor) never
//! runs subscriber code and never waits on it. Callback subscribers get a
//! dedicated delivery thread that drains their queue in order.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::{debug, trace};

use crate::error::{ClientError, Result};
use crate::message::{Reply, StatusSnapshot};

/// Connection lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The handshake succeeded and the session is active.
    Connected,
    /// The handshake failed; the transport has been closed.
    AuthFailed {
        /// Message provided by the device, if any.
        message: Option<String>,
        /// Human-readable description of the failure.
        reason: String,
    },
    /// The active session ended. Published at most once per client.
    Disconnected { reason: DisconnectReason },
}

/// Why an active session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The device closed the connection.
    PeerClosed,
    /// Reading from the device failed.
    Io(String),
    /// [`close`](crate::DeviceClient::close) was called.
    ClosedByCaller,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::PeerClosed => f.write_str("peer closed"),
            DisconnectReason::Io(detail) => write!(f, "io error: {detail}"),
            DisconnectReason::ClosedByCaller => f.write_str("closed by caller"),
        }
    }
}

/// Anything a subscriber can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connection(ConnectionEvent),
    /// A status push replaced the snapshot.
    StatusUpdated(Arc<StatusSnapshot>),
    /// A `{"status": ...}` reply arrived while active. Not correlated with
    /// the command that caused it.
    Reply(Reply),
}

impl ClientEvent {
    fn family(&self) -> EventFilter {
        match self {
            ClientEvent::Connection(_) => EventFilter::CONNECTION,
            ClientEvent::StatusUpdated(_) => EventFilter::STATUS,
            ClientEvent::Reply(_) => EventFilter::REPLIES,
        }
    }
}

/// Set of event families a subscriber wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventFilter(u8);

impl EventFilter {
    pub const CONNECTION: Self = Self(0b001);
    pub const STATUS: Self = Self(0b010);
    pub const REPLIES: Self = Self(0b100);
    pub const ALL: Self = Self(0b111);

    /// Union of two filters.
    pub const fn and(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether `event` belongs to a selected family.
    pub fn accepts(self, event: &ClientEvent) -> bool {
        self.0 & event.family().0 != 0
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::ALL
    }
}

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Subscriber {
    id: SubscriptionId,
    filter: EventFilter,
    tx: Sender<ClientEvent>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// Fan-out of [`ClientEvent`]s to registered subscribers.
///
/// Cloning yields another handle to the same subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback, run on its own delivery thread.
    ///
    /// The callback sees events in publish order, starting with the first
    /// event published after this call returns. It may call back into the
    /// client, including `close()`.
    pub fn subscribe<F>(&self, filter: EventFilter, mut callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(ClientEvent) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<ClientEvent>();
        let id = self.register(filter, tx);

        let spawned = thread::Builder::new()
            .name(format!("devlink-events-{}", id.0))
            .spawn(move || {
                for event in rx {
                    callback(event);
                }
                trace!(subscription = %id, "event delivery finished");
            });

        if let Err(source) = spawned {
            self.unsubscribe(id);
            return Err(ClientError::Spawn {
                name: "event delivery",
                source,
            });
        }
        Ok(id)
    }

    /// Register a pull-style subscriber.
    ///
    /// The receiver disconnects once the subscription is removed or every
    /// bus handle is dropped.
    pub fn subscribe_channel(&self, filter: EventFilter) -> (SubscriptionId, Receiver<ClientEvent>) {
        let (tx, rx) = mpsc::channel();
        (self.register(filter, tx), rx)
    }

    /// Remove a subscriber. Events already queued for it are still delivered.
    ///
    /// Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.lock();
        let before = registry.subscribers.len();
        registry.subscribers.retain(|sub| sub.id != id);
        registry.subscribers.len() != before
    }

    /// Queue `event` for every interested subscriber. Never blocks on them.
    pub fn publish(&self, event: ClientEvent) {
        let mut registry = self.lock();
        registry.subscribers.retain(|sub| {
            if !sub.filter.accepts(&event) {
                return true;
            }
            match sub.tx.send(event.clone()) {
                Ok(()) => true,
                Err(_) => {
                    debug!(subscription = %sub.id, "dropping subscriber with closed queue");
                    false
                }
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn register(&self, filter: EventFilter, tx: Sender<ClientEvent>) -> SubscriptionId {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.subscribers.push(Subscriber { id, filter, tx });
        id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
