//! Infrastructure layer: sockets, timers, tasks.
//!
//! One [`supervisor::ConnectionSupervisor`] instance per remote endpoint,
//! each driven by an endpoint-specific handshake strategy ([`kodi`],
//! [`hass`]), composed by the [`controller`].

pub mod controller;
pub mod hass;
pub mod kodi;
pub mod supervisor;

pub use controller::run_bridge;
pub use supervisor::{ConnectError, ConnectionSupervisor, Endpoint, SendError, WsStream};
