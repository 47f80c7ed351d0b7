//! Wire-protocol message types for both remote endpoints.
//!
//! Both endpoints speak JSON text frames over websocket, but with different
//! dialects:
//!
//! - **Kodi** speaks JSON-RPC 2.0: requests carry `method`/`params`/`id`,
//!   notifications carry `method`/`params` without an `id`, responses carry
//!   `id`/`result`.
//! - **Home Assistant** speaks its own websocket API: every frame is an
//!   object discriminated by a `"type"` field (`auth_required`, `auth`,
//!   `auth_ok`, `call_service`, `result`, …).
//!
//! Using two distinct sets of types makes it a compile-time error to send a
//! Kodi frame to Home Assistant or vice versa.

pub mod hass;
pub mod kodi;
