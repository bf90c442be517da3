//! Client for networked LED/servo/sensor devices.
//!
//! Devices speak one JSON object per line over TCP. This crate bundles the
//! layers of the stack under one name:
//!
//! - [`transport`] — TCP connection with interruptible receive and idempotent close
//! - [`frame`] — newline-delimited JSON framing (tokio codec behind `async`)
//! - [`client`] — handshake, monitor and keep-alive loops, commands, events
//!
//! With the `cli` feature the crate also builds the `devlink` binary.

/// Re-export transport types.
pub mod transport {
    pub use devlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use devlink_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use devlink_client::*;
}

pub use devlink_client::{
    ClientConfig, ClientEvent, ConnectionEvent, DeviceClient, EventFilter, StatusSnapshot,
};
