//! kodi2home — Kodi to Home Assistant websocket bridge, entry point.
//!
//! The bridge keeps two long-lived websocket connections: one to Kodi's
//! JSON-RPC port, one to Home Assistant's websocket API.  Keymap entries in
//! Kodi broadcast notifications like
//!
//! ```xml
//! <volume_up>NotifyAll("kodi2home", "kodi_call_home",
//!                      {"trigger":"automation.volume_up"})</volume_up>
//! ```
//!
//! and the bridge turns each one into an `automation.trigger` service call on
//! the hub.  Both connections authenticate, health-check with keepalive
//! pings, and reconnect with exponential backoff for the lifetime of the
//! process.
//!
//! # Usage
//!
//! ```text
//! kodi2home [OPTIONS]
//!
//! Options:
//!   --config <PATH>          TOML config file [default: /etc/kodi2home/options.toml]
//!   --kodi-address <HOST>    Kodi hostname or IP
//!   --kodi-http-port <PORT>  Kodi HTTP JSON-RPC port
//!   --kodi-ws-port <PORT>    Kodi websocket JSON-RPC port
//!   --kodi-username <USER>   Kodi basic-auth username
//!   --kodi-password <PASS>   Kodi basic-auth password
//!   --home-address <URL>     Home Assistant websocket address
//!   --home-ssl <BOOL>        Use wss:// when the address has no scheme
//!   --home-token <TOKEN>     Home Assistant long-lived access token
//!   --ping-interval <SECS>   Keepalive ping interval
//! ```
//!
//! Every flag can also come from an environment variable (`K2H_*`, and
//! `SUPERVISOR_TOKEN` for the access token, which Home Assistant add-on
//! containers export automatically).  Precedence: CLI flag, then environment,
//! then config file, then built-in default.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use k2h_bridge::domain::{load_config, BridgeConfig};
use k2h_bridge::infrastructure::run_bridge;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Kodi to Home Assistant websocket bridge.
#[derive(Debug, Parser)]
#[command(
    name = "kodi2home",
    about = "Forwards Kodi keymap notifications as Home Assistant automation triggers",
    version
)]
struct Cli {
    /// Path to a TOML configuration file.  A missing file is fine; flags and
    /// environment variables can carry the whole configuration.
    #[arg(long, default_value = "/etc/kodi2home/options.toml", env = "K2H_CONFIG")]
    config: PathBuf,

    /// Kodi hostname or IP address.
    #[arg(long, env = "K2H_KODI_ADDRESS")]
    kodi_address: Option<String>,

    /// Kodi HTTP JSON-RPC port (web interface port).
    #[arg(long, env = "K2H_KODI_HTTP_PORT")]
    kodi_http_port: Option<u16>,

    /// Kodi websocket JSON-RPC port.
    #[arg(long, env = "K2H_KODI_WS_PORT")]
    kodi_ws_port: Option<u16>,

    /// Kodi basic-auth username.
    #[arg(long, env = "K2H_KODI_USERNAME")]
    kodi_username: Option<String>,

    /// Kodi basic-auth password.
    #[arg(long, env = "K2H_KODI_PASSWORD")]
    kodi_password: Option<String>,

    /// Home Assistant websocket address (full URL or host:port/path).
    #[arg(long, env = "K2H_HOME_ADDRESS")]
    home_address: Option<String>,

    /// Use TLS (wss://) when the address does not name a scheme itself.
    #[arg(long, env = "K2H_HOME_SSL")]
    home_ssl: Option<bool>,

    /// Home Assistant long-lived access token.
    #[arg(long, env = "SUPERVISOR_TOKEN")]
    home_token: Option<String>,

    /// Keepalive ping interval in seconds for both connections.
    #[arg(long, env = "K2H_PING_INTERVAL")]
    ping_interval: Option<u64>,
}

impl Cli {
    /// Loads the config file and layers the CLI/environment overrides on top.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let mut config = load_config(&self.config)?;

        if let Some(value) = self.kodi_address {
            config.kodi_address = value;
        }
        if let Some(value) = self.kodi_http_port {
            config.kodi_http_port = value;
        }
        if let Some(value) = self.kodi_ws_port {
            config.kodi_ws_port = value;
        }
        if let Some(value) = self.kodi_username {
            config.kodi_username = value;
        }
        if let Some(value) = self.kodi_password {
            config.kodi_password = value;
        }
        if let Some(value) = self.home_address {
            config.home_address = value;
        }
        if let Some(value) = self.home_ssl {
            config.home_ssl = value;
        }
        if let Some(value) = self.home_token {
            config.home_token = value;
        }
        if let Some(value) = self.ping_interval {
            config.ping_interval_secs = value;
        }

        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log level comes from RUST_LOG; default to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.into_bridge_config()?;

    info!(
        "kodi2home starting — kodi={}, hub={}",
        config.kodi_ws_url(),
        config.home_ws_url()
    );

    // Shared shutdown flag: the supervisors poll it and exit their reconnect
    // loops, closing both sockets cleanly.
    let running = Arc::new(AtomicBool::new(true));
    let running_signal = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — shutting down");
                running_signal.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C: {e}");
            }
        }
    });

    run_bridge(config, running).await?;

    info!("kodi2home stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
