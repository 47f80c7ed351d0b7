//! Application layer: pure per-message logic.
//!
//! The functions in this layer have no I/O side effects and no dependency on
//! async runtimes or sockets, which keeps the bridge's decision making unit
//! testable without a network:
//!
//! ```text
//! raw Kodi frame ──filter──▶ NotificationEvent ──forwarder──▶ call_service
//! ```

pub mod filter;
pub mod forwarder;

pub use filter::filter_notification;
pub use forwarder::TriggerForwarder;
