//! Kodi endpoint: websocket handshake strategy and the HTTP control client.
//!
//! The websocket side connects to Kodi's JSON-RPC port with an HTTP
//! basic-auth header on the upgrade request, then probes the endpoint with an
//! `Application.GetProperties` request.  The probe doubles as the
//! authentication step: a misconfigured address, a non-Kodi peer, or rejected
//! credentials all surface as a handshake failure, which the supervisor
//! backoff-retries like any other.
//!
//! The HTTP side is a one-shot JSON-RPC call to Kodi's web interface port,
//! used at startup to reload the keymaps so edited `NotifyAll` entries take
//! effect without restarting Kodi.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info};

use k2h_core::protocol::kodi::{JsonRpcRequest, KodiFrame};

use crate::domain::BridgeConfig;
use crate::infrastructure::supervisor::{ConnectError, Endpoint, WsStream};

/// Correlation id of the handshake probe.  Per-connection, so reuse across
/// reconnects is fine.
const HANDSHAKE_ID: u64 = 1;

/// How long to wait for the probe response before giving up on the attempt.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection strategy for the Kodi websocket.
pub struct KodiEndpoint {
    ws_url: String,
    username: String,
    password: String,
}

impl KodiEndpoint {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            ws_url: config.kodi_ws_url(),
            username: config.kodi_username.clone(),
            password: config.kodi_password.clone(),
        }
    }
}

#[async_trait]
impl Endpoint for KodiEndpoint {
    fn name(&self) -> &'static str {
        "kodi"
    }

    async fn connect(&self) -> Result<WsStream, ConnectError> {
        let mut request = self.ws_url.as_str().into_client_request()?;

        // Kodi deployments behind its web server expect HTTP basic auth on
        // the upgrade request.  An empty username disables the header for
        // installations with auth turned off.
        if !self.username.is_empty() {
            let credentials =
                base64_encode(format!("{}:{}", self.username, self.password).as_bytes());
            let header = format!("Basic {credentials}");
            request.headers_mut().insert(
                http::header::AUTHORIZATION,
                header
                    .parse()
                    .map_err(|_| ConnectError::Protocol("credentials are not header-safe".into()))?,
            );
        }

        debug!("connecting to kodi at {}", self.ws_url);
        let (ws, _response) = connect_async(request).await?;
        Ok(ws)
    }

    async fn authenticate(&self, ws: &mut WsStream) -> Result<(), ConnectError> {
        let probe = JsonRpcRequest::new(
            HANDSHAKE_ID,
            "Application.GetProperties",
            Some(json!({"properties": ["name", "version"]})),
        );
        let text =
            serde_json::to_string(&probe).map_err(|e| ConnectError::Protocol(e.to_string()))?;
        ws.send(WsMessage::Text(text)).await?;

        let properties = timeout(HANDSHAKE_TIMEOUT, wait_for_response(ws, HANDSHAKE_ID))
            .await
            .map_err(|_| ConnectError::Protocol("handshake probe timed out".into()))??;

        info!("kodi responded to handshake probe: {properties}");
        Ok(())
    }
}

/// Reads frames until the response to `id` arrives.
///
/// The socket is a shared bus — notifications can interleave with the probe
/// response, so unrelated frames are skipped rather than treated as errors.
async fn wait_for_response(ws: &mut WsStream, id: u64) -> Result<String, ConnectError> {
    loop {
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                if let Ok(frame) = KodiFrame::parse(&text) {
                    if frame.is_response_to(id) {
                        let result = frame.result.map(|r| r.to_string()).unwrap_or_default();
                        return Ok(result);
                    }
                }
            }
            Some(Ok(WsMessage::Close(_))) => {
                return Err(ConnectError::Protocol(
                    "connection closed during handshake".into(),
                ));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(ConnectError::Protocol(
                    "connection ended during handshake".into(),
                ));
            }
        }
    }
}

// ── HTTP control API ──────────────────────────────────────────────────────────

/// Asks Kodi to reload its keymap files via the HTTP JSON-RPC API.
///
/// Called once, after the websocket connection first becomes ready, so that
/// keymap edits made while the bridge was down take effect.  Fire-and-forget:
/// the caller logs a failure and moves on.
///
/// # Errors
///
/// Returns an error if the HTTP request fails or Kodi answers with a
/// non-success status.
pub async fn reload_keymaps(config: &BridgeConfig) -> anyhow::Result<()> {
    let request = JsonRpcRequest::new(
        HANDSHAKE_ID,
        "Input.ExecuteAction",
        Some(json!({"action": "reloadkeymaps"})),
    );

    let client = reqwest::Client::new();
    let mut call = client.post(config.kodi_http_url()).json(&request);
    if !config.kodi_username.is_empty() {
        call = call.basic_auth(&config.kodi_username, Some(&config.kodi_password));
    }

    let response = call
        .send()
        .await
        .with_context(|| format!("keymap reload request to {} failed", config.kodi_http_url()))?;
    response
        .error_for_status()
        .context("kodi rejected the keymap reload request")?;

    info!("kodi keymaps reloaded");
    Ok(())
}

// ── Helper: base64 encoding ───────────────────────────────────────────────────

/// Encodes bytes as standard base64 (RFC 4648) for the basic-auth header.
///
/// Small enough that pulling in a `base64` crate for this one call site is
/// not worth it.
fn base64_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    let mut result = String::with_capacity(data.len().div_ceil(3) * 4);

    for chunk in data.chunks(3) {
        let b0 = chunk[0];
        let b1 = if chunk.len() > 1 { chunk[1] } else { 0 };
        let b2 = if chunk.len() > 2 { chunk[2] } else { 0 };

        result.push(ALPHABET[(b0 >> 2) as usize] as char);
        result.push(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        result.push(if chunk.len() > 1 {
            ALPHABET[(((b1 & 0x0F) << 2) | (b2 >> 6)) as usize] as char
        } else {
            '='
        });
        result.push(if chunk.len() > 2 {
            ALPHABET[(b2 & 0x3F) as usize] as char
        } else {
            '='
        });
    }

    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────
