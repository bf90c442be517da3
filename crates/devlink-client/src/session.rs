use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use devlink_transport::TcpTransport;
use tracing::{debug, info};

use crate::client::ConnectionState;
use crate::command::Command;
use crate::error::{ClientError, Result};
use crate::events::{ClientEvent, ConnectionEvent, DisconnectReason, EventBus};
use crate::message::StatusSnapshot;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One-shot stop flag that background threads can sleep on.
#[derive(Default)]
pub(crate) struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    pub(crate) fn stop(&self) {
        *lock(&self.stopped) = true;
        self.cv.notify_all();
    }

    /// Sleep for `timeout` or until stopped. Returns `true` if stopped.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = lock(&self.stopped);
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// State shared by the client handle and its background threads.
pub(crate) struct Shared {
    state: Mutex<ConnectionState>,
    /// false -> true at Active, true -> false at shutdown. Never set again.
    running: AtomicBool,
    snapshot: Mutex<Option<Arc<StatusSnapshot>>>,
    transport: OnceLock<TcpTransport>,
    disconnected: AtomicBool,
    pub(crate) bus: EventBus,
    pub(crate) stop: StopSignal,
}

impl Shared {
    pub(crate) fn new(bus: EventBus) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ConnectionState::Idle),
            running: AtomicBool::new(false),
            snapshot: Mutex::new(None),
            transport: OnceLock::new(),
            disconnected: AtomicBool::new(false),
            bus,
            stop: StopSignal::default(),
        })
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    /// Move `from -> to`, failing if the current state is not `from`.
    pub(crate) fn transition(&self, from: ConnectionState, to: ConnectionState) -> Result<()> {
        let mut state = lock(&self.state);
        if *state != from {
            return Err(ClientError::InvalidState {
                expected: from,
                actual: *state,
            });
        }
        debug!(%from, %to, "state transition");
        *state = to;
        Ok(())
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Enter Active and raise the running flag.
    pub(crate) fn activate(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if *state != ConnectionState::Authenticating {
            return Err(ClientError::InvalidState {
                expected: ConnectionState::Authenticating,
                actual: *state,
            });
        }
        *state = ConnectionState::Active;
        // Raised under the state lock; shutdown clears both under it too.
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    pub(crate) fn install_transport(&self, transport: TcpTransport) -> bool {
        self.transport.set(transport).is_ok()
    }

    pub(crate) fn transport(&self) -> Option<&TcpTransport> {
        self.transport.get()
    }

    pub(crate) fn snapshot(&self) -> Option<Arc<StatusSnapshot>> {
        lock(&self.snapshot).clone()
    }

    /// Replace the snapshot wholesale and return the new one.
    pub(crate) fn replace_snapshot(&self, snapshot: StatusSnapshot) -> Arc<StatusSnapshot> {
        let snapshot = Arc::new(snapshot);
        *lock(&self.snapshot) = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Frame and write one command.
    pub(crate) fn send(&self, command: &Command) -> Result<()> {
        let transport = self.transport().ok_or(ClientError::Closed)?;
        let line = command.to_line()?;
        transport.send(&line)?;
        Ok(())
    }

    /// Stop both loops and close the transport. Safe to call repeatedly.
    ///
    /// Returns `true` for the call that actually ended the session.
    pub(crate) fn shutdown(&self) -> bool {
        let (previous, was_running) = {
            let mut state = lock(&self.state);
            let previous = std::mem::replace(&mut *state, ConnectionState::Closed);
            (previous, self.running.swap(false, Ordering::AcqRel))
        };
        self.stop.stop();
        let closed_socket = self.transport().is_some_and(TcpTransport::close);
        if previous != ConnectionState::Closed {
            info!(from = %previous, "session closed");
        }
        was_running || closed_socket
    }

    /// Publish `Disconnected` unless it was already published.
    pub(crate) fn publish_disconnected(&self, reason: DisconnectReason) -> bool {
        if self.disconnected.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!(%reason, "disconnected");
        self.bus
            .publish(ClientEvent::Connection(ConnectionEvent::Disconnected { reason }));
        true
    }
}
