//! k2h-bridge library crate.
//!
//! This crate provides the `kodi2home` daemon: a bridge that listens for
//! broadcast notifications on a Kodi websocket and forwards the automation
//! triggers they carry to a Home Assistant websocket.
//!
//! # Architecture
//!
//! ```text
//! Kodi (JSON-RPC over websocket)
//!         ↕
//! [k2h-bridge]
//!   ├── domain/           BridgeConfig (immutable startup configuration)
//!   ├── application/      Pure per-message logic:
//!   │     ├── filter/     classify inbound Kodi frames → NotificationEvent
//!   │     └── forwarder/  NotificationEvent → Home Assistant call_service
//!   └── infrastructure/
//!         ├── supervisor/ generic reconnect state machine (one per endpoint)
//!         ├── kodi/       Kodi endpoint handshake + HTTP control client
//!         ├── hass/       Home Assistant endpoint handshake
//!         └── controller/ composition root wiring the pipeline
//!         ↕
//! Home Assistant (websocket API)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O beyond reading the config file at startup.
//! - `application` depends on `domain` and `k2h-core` only — no sockets, no
//!   async.  The filter and forwarder are plain functions over frames.
//! - `infrastructure` owns every socket, timer, and task.

/// Domain layer: startup configuration.
pub mod domain;

/// Application layer: notification filtering and trigger forwarding.
pub mod application;

/// Infrastructure layer: connection supervisors, endpoint handshakes, and
/// the bridge controller.
pub mod infrastructure;
