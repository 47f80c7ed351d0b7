//! Trigger forwarder: maps a notification to a Home Assistant trigger request.
//!
//! The mapping itself is pure; the only state is the monotonically increasing
//! command id that the Home Assistant websocket API requires per session.
//! Submission (and the drop-on-not-ready policy) lives in the controller —
//! this module never touches a socket.

use std::sync::atomic::{AtomicU64, Ordering};

use k2h_core::protocol::hass::HassCommand;
use k2h_core::NotificationEvent;

/// Builds the trigger-request frames for forwarded notifications.
///
/// One instance lives for the whole process.  Ids keep increasing across hub
/// reconnects, which Home Assistant accepts — only reuse within a session is
/// rejected.
#[derive(Debug)]
pub struct TriggerForwarder {
    next_id: AtomicU64,
}

impl TriggerForwarder {
    pub fn new() -> Self {
        Self {
            // The auth frame implicitly takes "slot zero" of the session;
            // command ids start at 1.
            next_id: AtomicU64::new(1),
        }
    }

    /// Maps one notification to the `call_service` command that triggers its
    /// automation, consuming the next command id.
    pub fn build(&self, event: &NotificationEvent) -> HassCommand {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        HassCommand::trigger_automation(id, event.trigger.clone())
    }
}

impl Default for TriggerForwarder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn event(trigger: &str) -> NotificationEvent {
        NotificationEvent {
            sender: "kodi2home".to_string(),
            method: "Other.NotifyAll".to_string(),
            trigger: trigger.to_string(),
        }
    }

    #[test]
    fn test_build_produces_call_service_frame() {
        let forwarder = TriggerForwarder::new();

        let command = forwarder.build(&event("automation.volume_up"));
        let value: Value = serde_json::to_value(&command).unwrap();

        assert_eq!(value["type"], "call_service");
        assert_eq!(value["domain"], "automation");
        assert_eq!(value["service"], "trigger");
        assert_eq!(value["service_data"]["entity_id"], "automation.volume_up");
    }

    #[test]
    fn test_ids_increase_monotonically() {
        let forwarder = TriggerForwarder::new();

        let ids: Vec<u64> = (0..4)
            .map(|_| {
                let command = forwarder.build(&event("automation.x"));
                match command {
                    HassCommand::CallService { id, .. } => id,
                    other => panic!("expected CallService, got {other:?}"),
                }
            })
            .collect();

        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_trigger_is_forwarded_opaquely() {
        // The forwarder must not interpret or normalise the identifier.
        let forwarder = TriggerForwarder::new();

        let command = forwarder.build(&event("script.weird NAME-42"));
        match command {
            HassCommand::CallService { service_data, .. } => {
                assert_eq!(service_data.entity_id, "script.weird NAME-42");
            }
            other => panic!("expected CallService, got {other:?}"),
        }
    }
}
