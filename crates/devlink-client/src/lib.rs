//! Client for networked LED/servo/sensor devices.
//!
//! This is the "just works" layer. Build a [`ClientConfig`], subscribe to
//! the events you care about, [`connect`](DeviceClient::connect), then issue
//! commands. Behind the scenes a monitor thread keeps the latest
//! [`StatusSnapshot`] current and a keep-alive thread pings the device.
//!
//! ```no_run
//! use devlink_client::{ClientConfig, DeviceClient, EventFilter, ClientEvent};
//!
//! # fn main() -> devlink_client::Result<()> {
//! let client = DeviceClient::new(ClientConfig::new("192.168.4.1", 8080, "secret"));
//! client.subscribe(EventFilter::STATUS, |event| {
//!     if let ClientEvent::StatusUpdated(snapshot) = event {
//!         println!("servo at {:?}", snapshot.servo_angle());
//!     }
//! })?;
//! client.connect()?;
//! client.set_servo(90)?;
//! client.get_status();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handshake;
pub mod message;

mod keepalive;
mod monitor;
mod session;

pub use client::{ConnectionState, DeviceClient};
pub use command::Command;
pub use config::{
    ClientConfig, ServoPolicy, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT,
    DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_PORT, MIN_KEEPALIVE_INTERVAL, MIN_TIMEOUT,
    SERVO_MAX_ANGLE, SERVO_MIN_ANGLE,
};
pub use dispatcher::CommandDispatcher;
pub use error::{AuthFailure, ClientError, Result};
pub use events::{
    ClientEvent, ConnectionEvent, DisconnectReason, EventBus, EventFilter, SubscriptionId,
};
pub use handshake::{authenticate, HandshakeConfig, HandshakeResult, AUTH_CHALLENGE_STATUS};
pub use message::{ButtonState, LedState, Message, Potentiometer, Reply, ServoState, StatusSnapshot};
