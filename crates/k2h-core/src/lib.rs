//! k2h-core library crate.
//!
//! Shared, I/O-free building blocks for the Kodi2Home bridge:
//!
//! ```text
//! [k2h-core]
//!   ├── domain/      Connection lifecycle types: state machine, backoff,
//!   │                events handed between the bridge tasks
//!   └── protocol/    Wire message types for both remote endpoints:
//!         ├── kodi/  Kodi JSON-RPC frames (notifications, requests, responses)
//!         └── hass/  Home Assistant websocket API frames (auth, call_service)
//! ```
//!
//! # Layer rules
//!
//! Nothing in this crate touches a socket, spawns a task, or depends on an
//! async runtime.  The bridge binary (`k2h-bridge`) owns all I/O; this crate
//! owns the types that flow through it, which keeps the protocol and the
//! reconnect policy unit-testable without a network.

/// Domain layer: connection state machine, backoff policy, bridge events.
pub mod domain;

/// Protocol layer: serde types for the Kodi and Home Assistant wire formats.
pub mod protocol;

pub use domain::backoff::Backoff;
pub use domain::state::{ConnectionEvent, ConnectionState, NotificationEvent};
