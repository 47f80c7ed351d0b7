//! Kodi JSON-RPC frame types.
//!
//! The Kodi websocket carries heterogeneous traffic: responses to our own
//! requests, player/library notifications, and the broadcast notifications
//! produced by keymap entries such as
//!
//! ```xml
//! <volume_up>NotifyAll("kodi2home", "kodi_call_home",
//!                      {"trigger":"automation.volume_up"})</volume_up>
//! ```
//!
//! which arrive on the wire as
//!
//! ```json
//! {"jsonrpc":"2.0","method":"Other.NotifyAll",
//!  "params":{"sender":"kodi2home","data":{"trigger":"automation.volume_up"}}}
//! ```
//!
//! [`KodiFrame`] is deliberately loose — every field optional — because the
//! bridge only classifies frames, it never owns the full Kodi schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// JSON-RPC method name of the broadcast notification channel the bridge
/// listens on.
pub const NOTIFY_METHOD: &str = "Other.NotifyAll";

/// Sender tag the keymap entries stamp on their notifications.  Frames with
/// any other sender are someone else's traffic and are ignored.
pub const NOTIFY_SENDER: &str = "kodi2home";

/// Error raised when an inbound frame is not valid JSON or not an object.
///
/// Callers on the receive path treat this as "drop the frame", never as a
/// connection failure: the socket carries traffic the bridge does not own.
#[derive(Debug, Error)]
#[error("malformed Kodi frame: {0}")]
pub struct FrameError(#[from] serde_json::Error);

// ── Inbound frames ────────────────────────────────────────────────────────────

/// One inbound frame from the Kodi websocket, partially decoded.
///
/// Exactly one of the `method`/`result` shapes is populated in practice:
/// notifications carry `method` + `params` and no `id`; responses carry `id` +
/// `result`.  Everything is optional so that unknown traffic still parses.
#[derive(Debug, Clone, Deserialize)]
pub struct KodiFrame {
    /// Notification or request method name, absent on responses.
    #[serde(default)]
    pub method: Option<String>,
    /// Method parameters, left as raw JSON until the method is matched.
    #[serde(default)]
    pub params: Option<Value>,
    /// Request/response correlation id, absent on notifications.
    #[serde(default)]
    pub id: Option<Value>,
    /// Response payload, absent on notifications.
    #[serde(default)]
    pub result: Option<Value>,
}

impl KodiFrame {
    /// Parses a raw text frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if the text is not a JSON object.
    pub fn parse(raw: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// `true` if this frame is the response to the request with `id`.
    pub fn is_response_to(&self, id: u64) -> bool {
        self.result.is_some() && self.id == Some(Value::from(id))
    }
}

/// Params envelope of a [`NOTIFY_METHOD`] notification.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyParams {
    /// Tag identifying who broadcast the notification.
    pub sender: String,
    /// Free-form payload; the bridge only reads `data.trigger`.
    pub data: NotifyData,
}

/// Nested `data` object of a notification payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyData {
    /// The automation identifier to trigger on the hub.
    pub trigger: String,
}

// ── Outbound requests ─────────────────────────────────────────────────────────

/// A JSON-RPC 2.0 request frame sent to Kodi.
///
/// Serializes as
/// `{"jsonrpc":"2.0","id":1,"method":"...","params":{...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    jsonrpc: &'static str,
    /// Correlation id echoed back in the response frame.
    pub id: u64,
    /// Method name, e.g. `"Application.GetProperties"`.
    pub method: String,
    /// Method parameters; omitted from the wire when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
