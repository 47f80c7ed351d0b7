//! Notification filter: stateless per-message classification.
//!
//! The Kodi websocket is a shared bus — responses to our own requests, player
//! and library notifications, and other add-ons' broadcasts all arrive on it.
//! This filter picks out exactly the frames the bridge owns and silently
//! drops everything else.  Malformed payloads are never errors here: traffic
//! we do not own is not ours to complain about.

use k2h_core::protocol::kodi::{KodiFrame, NotifyParams, NOTIFY_METHOD, NOTIFY_SENDER};
use k2h_core::NotificationEvent;
use tracing::trace;

/// Classifies one raw inbound frame from the Kodi connection.
///
/// Returns `Some(NotificationEvent)` exactly when:
///
/// - the frame parses as a JSON-RPC notification,
/// - its method is [`NOTIFY_METHOD`], and
/// - its params envelope is `{sender: "kodi2home", data: {trigger: …}}`.
///
/// Everything else — other methods, other senders, missing fields, garbage —
/// yields `None`.
pub fn filter_notification(raw: &str) -> Option<NotificationEvent> {
    let frame = match KodiFrame::parse(raw) {
        Ok(frame) => frame,
        Err(e) => {
            trace!("dropping unparseable frame: {e}");
            return None;
        }
    };

    let method = frame.method?;
    if method != NOTIFY_METHOD {
        return None;
    }

    // The envelope shape is fixed by the keymap entries:
    //   NotifyAll("kodi2home", ..., {"trigger": "<automation id>"})
    let params: NotifyParams = serde_json::from_value(frame.params?).ok()?;
    if params.sender != NOTIFY_SENDER {
        trace!("ignoring notification from sender {:?}", params.sender);
        return None;
    }

    Some(NotificationEvent {
        sender: params.sender,
        method,
        trigger: params.data.trigger,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
