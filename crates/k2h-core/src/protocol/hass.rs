//! Home Assistant websocket API frame types.
//!
//! Every frame is a JSON object discriminated by a `"type"` field.  The
//! session starts with the server-initiated auth exchange:
//!
//! ```text
//! server → {"type":"auth_required","ha_version":"2024.6.0"}
//! client → {"type":"auth","access_token":"..."}
//! server → {"type":"auth_ok", ...}        (or "auth_invalid")
//! ```
//!
//! after which the bridge sends one [`HassCommand::CallService`] per forwarded
//! trigger and drains the `result` acknowledgements.

use serde::{Deserialize, Serialize};

// ── Outbound frames ───────────────────────────────────────────────────────────

/// Frames the bridge sends to Home Assistant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HassCommand {
    /// Reply to `auth_required` carrying the long-lived access token.
    Auth {
        access_token: String,
    },
    /// Service call executing one automation trigger.
    ///
    /// Command ids must increase monotonically within a session; Home
    /// Assistant rejects reused ids.
    CallService {
        id: u64,
        domain: String,
        service: String,
        service_data: ServiceData,
    },
}

impl HassCommand {
    /// Builds the trigger request for one automation id.
    ///
    /// The entity id is forwarded opaquely — the bridge attaches no meaning
    /// to it beyond "the automation the hub should run".
    pub fn trigger_automation(id: u64, entity_id: impl Into<String>) -> Self {
        HassCommand::CallService {
            id,
            domain: "automation".to_string(),
            service: "trigger".to_string(),
            service_data: ServiceData {
                entity_id: entity_id.into(),
            },
        }
    }
}

/// `service_data` payload of a [`HassCommand::CallService`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceData {
    pub entity_id: String,
}

// ── Inbound frames ────────────────────────────────────────────────────────────

/// Frames the bridge receives from Home Assistant.
///
/// Only the handshake frames and `result` acknowledgements are modelled;
/// anything else (event subscriptions, pongs, …) lands in `Unknown` and is
/// ignored, so new server-side frame types never break the bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HassInbound {
    /// First frame of every session; the server is waiting for credentials.
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    /// Credentials accepted; the session is usable.
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    /// Credentials rejected; the server closes the socket after this frame.
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    /// Acknowledgement of a command frame.
    Result {
        id: u64,
        success: bool,
    },
    /// Any frame type the bridge does not care about.
    #[serde(other)]
    Unknown,
}

impl HassInbound {
    /// Parses a raw text frame; `None` if it is not valid JSON for any known
    /// or unknown frame shape.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
