//! Bridge configuration: the connection parameters for both endpoints.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is read once at startup — from a TOML file, CLI flags, or environment
//! variables (see `main.rs` for precedence) — and immutable thereafter.
//!
//! Fields annotated with `#[serde(default = "...")]` fall back to their
//! defaults when absent from the TOML file, so a partial config file (or no
//! file at all) still produces a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// All connection parameters for both remote endpoints.
///
/// Build this once at startup, then wrap it in an `Arc` and share it with the
/// supervisor tasks.  Nothing mutates it after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    /// Hostname or IP of the Kodi machine.
    #[serde(default = "default_kodi_address")]
    pub kodi_address: String,

    /// Kodi's HTTP JSON-RPC port (the web interface port).  Used once at
    /// startup for the keymap reload request.
    #[serde(default = "default_kodi_http_port")]
    pub kodi_http_port: u16,

    /// Kodi's websocket JSON-RPC port.
    #[serde(default = "default_kodi_ws_port")]
    pub kodi_ws_port: u16,

    /// Username for Kodi's HTTP basic auth.  Empty disables the auth header.
    #[serde(default = "default_kodi_username")]
    pub kodi_username: String,

    /// Password for Kodi's HTTP basic auth.
    #[serde(default)]
    pub kodi_password: String,

    /// Home Assistant websocket endpoint.  Either a full URL
    /// (`ws://…` / `wss://…`) or a bare `host[:port]/path`, in which case the
    /// scheme is chosen by [`home_ssl`](Self::home_ssl).
    #[serde(default = "default_home_address")]
    pub home_address: String,

    /// Use TLS (`wss://`) when `home_address` does not name a scheme itself.
    #[serde(default)]
    pub home_ssl: bool,

    /// Long-lived Home Assistant access token for the auth handshake.
    #[serde(default)]
    pub home_token: String,

    /// Keepalive ping interval, in seconds, for both websocket connections.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

impl BridgeConfig {
    /// Websocket URL of the Kodi JSON-RPC endpoint.
    pub fn kodi_ws_url(&self) -> String {
        format!("ws://{}:{}/jsonrpc", self.kodi_address, self.kodi_ws_port)
    }

    /// HTTP URL of the Kodi JSON-RPC endpoint (control API).
    pub fn kodi_http_url(&self) -> String {
        format!("http://{}:{}/jsonrpc", self.kodi_address, self.kodi_http_port)
    }

    /// Websocket URL of the Home Assistant API.
    ///
    /// An explicit scheme in `home_address` wins; otherwise `home_ssl` picks
    /// between `wss://` and `ws://`.
    pub fn home_ws_url(&self) -> String {
        if self.home_address.contains("://") {
            self.home_address.clone()
        } else if self.home_ssl {
            format!("wss://{}", self.home_address)
        } else {
            format!("ws://{}", self.home_address)
        }
    }

    /// Keepalive ping interval as a [`Duration`].
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        // Round-trip through an empty TOML document so the serde defaults are
        // the single definition of the default values.
        toml::from_str("").expect("empty config must deserialize via field defaults")
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_kodi_address() -> String {
    "127.0.0.1".to_string()
}
fn default_kodi_http_port() -> u16 {
    8080
}
fn default_kodi_ws_port() -> u16 {
    9090
}
fn default_kodi_username() -> String {
    "kodi".to_string()
}
fn default_home_address() -> String {
    "ws://supervisor/core/api/websocket".to_string()
}
fn default_ping_interval_secs() -> u64 {
    30
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads the configuration from a TOML file.
///
/// A missing file is not an error: it yields the defaults, so the bridge can
/// run on CLI flags and environment variables alone.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file exists but cannot be read, or
/// [`ConfigError::Parse`] if its content is not valid TOML for
/// [`BridgeConfig`].
pub fn load_config(path: &Path) -> Result<BridgeConfig, ConfigError> {
    if !path.exists() {
        return Ok(BridgeConfig::default());
    }

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(toml::from_str(&text)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
