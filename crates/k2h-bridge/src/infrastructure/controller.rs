//! Bridge controller: composition root and startup orchestration.
//!
//! Owns both connection supervisors and wires the pipeline
//!
//! ```text
//! kodi events ─▶ filter ─▶ forwarder ─▶ hub send
//! ```
//!
//! The two connections are coupled only through this hand-off: a hub that is
//! down never blocks the Kodi receive loop, it just costs the triggers that
//! arrive in the meantime (the next button press re-triggers naturally).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use k2h_core::protocol::hass::HassInbound;
use k2h_core::{ConnectionEvent, NotificationEvent};

use crate::application::{filter_notification, TriggerForwarder};
use crate::domain::BridgeConfig;
use crate::infrastructure::hass::HassEndpoint;
use crate::infrastructure::kodi::{self, KodiEndpoint};
use crate::infrastructure::supervisor::ConnectionSupervisor;

/// Runs the bridge until the `running` flag clears.
///
/// Constructs both supervisors from `config`, consumes the Kodi event stream,
/// and forwards every matching notification to the hub.  On the Kodi
/// connection's first ready transition, a one-time keymap reload is requested
/// over Kodi's HTTP control API; its failure is logged, never fatal.
pub async fn run_bridge(config: BridgeConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let config = Arc::new(config);

    let kodi = Arc::new(ConnectionSupervisor::new(
        KodiEndpoint::new(&config),
        config.ping_interval(),
    ));
    let hub = Arc::new(ConnectionSupervisor::new(
        HassEndpoint::new(&config),
        config.ping_interval(),
    ));

    let mut kodi_events = Arc::clone(&kodi).start(Arc::clone(&running));
    let hub_events = Arc::clone(&hub).start(Arc::clone(&running));

    // The hub only ever sends acknowledgements our way; drain them so the
    // socket never backs up, and surface rejected service calls in the log.
    tokio::spawn(drain_hub_events(hub_events));

    let forwarder = TriggerForwarder::new();
    let mut keymap_reloaded = false;

    while let Some(event) = kodi_events.recv().await {
        match event {
            ConnectionEvent::Ready => {
                if !keymap_reloaded {
                    keymap_reloaded = true;
                    let config = Arc::clone(&config);
                    tokio::spawn(async move {
                        if let Err(e) = kodi::reload_keymaps(&config).await {
                            warn!("keymap reload failed (continuing without it): {e:#}");
                        }
                    });
                }
            }
            ConnectionEvent::Lost => {
                // The supervisor already logged the loss and is backing off.
            }
            ConnectionEvent::Message(raw) => {
                let Some(notification) = filter_notification(&raw) else {
                    continue;
                };
                forward_trigger(&forwarder, &hub, &notification).await;
            }
        }
    }

    info!("bridge stopped");
    Ok(())
}

/// Maps one notification to a trigger request and submits it to the hub.
///
/// A hub that is not ready costs exactly this event: drop, one warn line,
/// done.  No retry, no queue.
async fn forward_trigger(
    forwarder: &TriggerForwarder,
    hub: &ConnectionSupervisor<HassEndpoint>,
    notification: &NotificationEvent,
) {
    let command = forwarder.build(notification);
    let text = match serde_json::to_string(&command) {
        Ok(text) => text,
        Err(e) => {
            error!("failed to encode trigger request: {e}");
            return;
        }
    };

    match hub.send(text).await {
        Ok(()) => info!("forwarded trigger {}", notification.trigger),
        Err(e) => warn!("dropping trigger {}: {e}", notification.trigger),
    }
}

/// Consumes the hub supervisor's event stream for the process lifetime.
async fn drain_hub_events(mut events: mpsc::Receiver<ConnectionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ConnectionEvent::Message(raw) => match HassInbound::parse(&raw) {
                Some(HassInbound::Result { id, success: false }) => {
                    warn!("home assistant rejected command {id}");
                }
                Some(frame) => debug!("home assistant: {frame:?}"),
                None => debug!("home assistant sent an unparseable frame"),
            },
            // Ready/Lost are logged by the supervisor itself.
            ConnectionEvent::Ready | ConnectionEvent::Lost => {}
        }
    }
}
