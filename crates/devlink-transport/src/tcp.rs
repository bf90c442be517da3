use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// A connected TCP transport.
///
/// Cloning yields another handle to the same socket, so a background reader
/// and a foreground writer can share one connection. Closing through any
/// handle shuts the socket down for all of them, which makes a receive that
/// is blocked on another thread return immediately.
#[derive(Clone)]
pub struct TcpTransport {
    inner: Arc<Inner>,
}

struct Inner {
    stream: TcpStream,
    peer: SocketAddr,
    closed: AtomicBool,
    /// Serializes whole-buffer writes so concurrent senders never interleave lines.
    write_lock: Mutex<()>,
}

impl TcpTransport {
    /// Resolve `host:port` and connect, giving each candidate address `timeout`.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let candidates: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                addr: addr.clone(),
                source,
            })?
            .collect();

        if candidates.is_empty() {
            return Err(TransportError::Resolve {
                addr,
                source: std::io::Error::new(ErrorKind::NotFound, "no addresses resolved"),
            });
        }

        let mut last_err = None;
        for candidate in candidates {
            debug!(%candidate, ?timeout, "connecting");
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    let transport = Self::from_stream(stream)?;
                    info!(peer = %transport.peer_addr(), "connected");
                    return Ok(transport);
                }
                Err(err) => {
                    debug!(%candidate, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Err(TransportError::Timeout { addr, timeout })
            }
            Some(source) => Err(TransportError::Connect { addr, source }),
            None => Err(TransportError::Timeout { addr, timeout }),
        }
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr()?;
        // Commands are tiny and latency-sensitive.
        stream.set_nodelay(true)?;
        Ok(Self {
            inner: Arc::new(Inner {
                stream,
                peer,
                closed: AtomicBool::new(false),
                write_lock: Mutex::new(()),
            }),
        })
    }

    /// Write the whole buffer (blocking).
    ///
    /// Returns `Err(TransportError::Closed)` once the transport has been closed.
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let _guard = self
            .inner
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut stream = &self.inner.stream;
        stream.write_all(bytes)?;
        stream.flush()?;
        Ok(())
    }

    /// Receive the next chunk of bytes (blocking).
    ///
    /// Returns `Ok(0)` when the peer closed the connection or when this
    /// transport was closed locally, including while the call was blocked.
    pub fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        if self.is_closed() {
            return Ok(0);
        }

        let mut stream = &self.inner.stream;
        loop {
            match stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                // Shutting the socket down can surface as an error on some platforms.
                Err(_) if self.is_closed() => return Ok(0),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Close the transport.
    ///
    /// Safe to call repeatedly and from several threads at once; only the
    /// first call shuts the socket down. Returns `true` for that call.
    pub fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        if let Err(err) = self.inner.stream.shutdown(Shutdown::Both) {
            // The peer may already have torn the connection down.
            debug!(peer = %self.inner.peer, error = %err, "socket shutdown reported an error");
        }
        info!(peer = %self.inner.peer, "transport closed");
        true
    }

    /// Whether [`close`](Self::close) has been called on any handle.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner
            .stream
            .set_read_timeout(timeout)
            .map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner
            .stream
            .set_write_timeout(timeout)
            .map_err(Into::into)
    }

    /// Address of the connected device.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

impl Read for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.receive(buf).map_err(into_io_error)
    }
}

impl Write for TcpTransport {
    /// Writes the whole buffer as one locked send.
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.send(buf).map_err(into_io_error)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn into_io_error(err: TransportError) -> std::io::Error {
    match err {
        TransportError::Io(io) => io,
        TransportError::Resolve { source, .. } | TransportError::Connect { source, .. } => source,
        TransportError::Closed => std::io::Error::new(ErrorKind::NotConnected, "transport closed"),
        other => std::io::Error::other(other.to_string()),
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer", &self.inner.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}
