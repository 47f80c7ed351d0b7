//! Home Assistant endpoint: websocket connect and auth handshake strategy.
//!
//! The handshake is server-initiated: Home Assistant sends `auth_required`
//! as soon as the socket opens, the bridge answers with its access token, and
//! the server settles the exchange with `auth_ok` or `auth_invalid`.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info};

use k2h_core::protocol::hass::{HassCommand, HassInbound};

use crate::domain::BridgeConfig;
use crate::infrastructure::supervisor::{ConnectError, Endpoint, WsStream};

/// How long the whole auth exchange may take before the attempt is abandoned.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection strategy for the Home Assistant websocket.
pub struct HassEndpoint {
    url: String,
    token: String,
}

impl HassEndpoint {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            url: config.home_ws_url(),
            token: config.home_token.clone(),
        }
    }

    /// The `auth_required` → `auth` → `auth_ok` exchange.
    async fn handshake(&self, ws: &mut WsStream) -> Result<(), ConnectError> {
        match next_frame(ws).await? {
            HassInbound::AuthRequired { ha_version } => {
                debug!(
                    "home assistant requests auth (version {})",
                    ha_version.as_deref().unwrap_or("unknown")
                );
            }
            // Instances running without auth skip straight to auth_ok.
            HassInbound::AuthOk { .. } => return Ok(()),
            other => {
                return Err(ConnectError::Protocol(format!(
                    "expected auth_required, got {other:?}"
                )));
            }
        }

        let auth = HassCommand::Auth {
            access_token: self.token.clone(),
        };
        let text =
            serde_json::to_string(&auth).map_err(|e| ConnectError::Protocol(e.to_string()))?;
        ws.send(WsMessage::Text(text)).await?;

        loop {
            match next_frame(ws).await? {
                HassInbound::AuthOk { ha_version } => {
                    info!(
                        "home assistant authenticated (version {})",
                        ha_version.as_deref().unwrap_or("unknown")
                    );
                    return Ok(());
                }
                HassInbound::AuthInvalid { message } => {
                    return Err(ConnectError::Auth(
                        message.unwrap_or_else(|| "access token rejected".to_string()),
                    ));
                }
                // Frame types we do not model are tolerated mid-handshake.
                HassInbound::Unknown => {}
                other => {
                    return Err(ConnectError::Protocol(format!(
                        "unexpected frame during auth: {other:?}"
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl Endpoint for HassEndpoint {
    fn name(&self) -> &'static str {
        "home-assistant"
    }

    async fn connect(&self) -> Result<WsStream, ConnectError> {
        debug!("connecting to home assistant at {}", self.url);
        let (ws, _response) = connect_async(self.url.as_str()).await?;
        Ok(ws)
    }

    async fn authenticate(&self, ws: &mut WsStream) -> Result<(), ConnectError> {
        timeout(AUTH_TIMEOUT, self.handshake(ws))
            .await
            .map_err(|_| ConnectError::Protocol("auth handshake timed out".into()))?
    }
}

/// Reads frames until one parses as a known or unknown Home Assistant frame.
async fn next_frame(ws: &mut WsStream) -> Result<HassInbound, ConnectError> {
    loop {
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                if let Some(frame) = HassInbound::parse(&text) {
                    return Ok(frame);
                }
                debug!("skipping unparseable frame during auth");
            }
            Some(Ok(WsMessage::Close(_))) => {
                return Err(ConnectError::Protocol("connection closed during auth".into()));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(ConnectError::Protocol("connection ended during auth".into()));
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
