//! End-to-end tests for the bridge pipeline.
//!
//! # Purpose
//!
//! These tests exercise the bridge through its *public* API — `run_bridge`
//! with a real `BridgeConfig` — against in-process mock servers that speak
//! just enough of each endpoint's protocol:
//!
//! - **Mock Kodi**: accepts the websocket upgrade, answers the
//!   `Application.GetProperties` handshake probe, and broadcasts whatever
//!   notification frames the test injects.  A kill switch drops the current
//!   session so reconnect behaviour can be observed.
//! - **Mock Home Assistant**: runs the `auth_required` → `auth` → `auth_ok`
//!   exchange, records every `call_service` frame, and acknowledges each with
//!   a `result` frame.  Same kill switch.
//!
//! Scenarios covered:
//!
//! - A matching notification becomes exactly one trigger request; unrelated
//!   and malformed traffic becomes none.
//! - A hub outage drops the triggers that arrive meanwhile — without
//!   disturbing the Kodi receive loop — and forwarding resumes after the
//!   automatic reconnect.
//! - The Kodi connection survives repeated losses and the pipeline keeps
//!   working afterwards.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use k2h_bridge::domain::BridgeConfig;
use k2h_bridge::infrastructure::run_bridge;

// ── Mock Kodi server ──────────────────────────────────────────────────────────

struct MockKodi {
    addr: SocketAddr,
    /// Frames pushed here are broadcast to the current session.
    notify: mpsc::UnboundedSender<String>,
    /// Drops the current session (the listener keeps accepting).
    kill: mpsc::UnboundedSender<()>,
    /// Fires once per completed handshake (initial connect and reconnects).
    ready: mpsc::UnboundedReceiver<()>,
}

async fn spawn_mock_kodi() -> MockKodi {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock kodi");
    let addr = listener.local_addr().expect("mock kodi addr");
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<String>();
    let (kill_tx, mut kill_rx) = mpsc::unbounded_channel::<()>();
    let (ready_tx, ready_rx) = mpsc::unbounded_channel::<()>();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(mut ws) = accept_async(stream).await else {
                continue;
            };

            'session: loop {
                tokio::select! {
                    frame = ws.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            let value: Value =
                                serde_json::from_str(&text).unwrap_or(Value::Null);
                            if value["method"] == "Application.GetProperties" {
                                let reply = json!({
                                    "jsonrpc": "2.0",
                                    "id": value["id"],
                                    "result": {
                                        "name": "Kodi",
                                        "version": {"major": 21, "minor": 0}
                                    }
                                });
                                if ws.send(Message::Text(reply.to_string())).await.is_err() {
                                    break 'session;
                                }
                                let _ = ready_tx.send(());
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break 'session,
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break 'session,
                    },
                    Some(frame) = notify_rx.recv() => {
                        if ws.send(Message::Text(frame)).await.is_err() {
                            break 'session;
                        }
                    }
                    Some(()) = kill_rx.recv() => break 'session,
                }
            }
        }
    });

    MockKodi {
        addr,
        notify: notify_tx,
        kill: kill_tx,
        ready: ready_rx,
    }
}

// ── Mock Home Assistant server ────────────────────────────────────────────────

struct MockHass {
    addr: SocketAddr,
    /// Every received call_service frame, in arrival order.
    calls: mpsc::UnboundedReceiver<Value>,
    /// Drops the current session (the listener keeps accepting).
    kill: mpsc::UnboundedSender<()>,
    /// Fires once per successful auth exchange.
    ready: mpsc::UnboundedReceiver<()>,
}

async fn spawn_mock_hass(expected_token: &str) -> MockHass {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock hass");
    let addr = listener.local_addr().expect("mock hass addr");
    let expected = expected_token.to_string();
    let (calls_tx, calls_rx) = mpsc::unbounded_channel::<Value>();
    let (kill_tx, mut kill_rx) = mpsc::unbounded_channel::<()>();
    let (ready_tx, ready_rx) = mpsc::unbounded_channel::<()>();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(mut ws) = accept_async(stream).await else {
                continue;
            };

            // Server-initiated auth exchange.
            let hello = json!({"type": "auth_required", "ha_version": "2024.6.0"});
            if ws.send(Message::Text(hello.to_string())).await.is_err() {
                continue;
            }

            let authed = loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
                        if value["type"] == "auth" {
                            break value["access_token"] == expected.as_str();
                        }
                    }
                    Some(Ok(_)) => {}
                    _ => break false,
                }
            };

            if !authed {
                let reject = json!({"type": "auth_invalid", "message": "Invalid access token"});
                let _ = ws.send(Message::Text(reject.to_string())).await;
                continue;
            }

            let ok = json!({"type": "auth_ok", "ha_version": "2024.6.0"});
            if ws.send(Message::Text(ok.to_string())).await.is_err() {
                continue;
            }
            let _ = ready_tx.send(());

            'session: loop {
                tokio::select! {
                    frame = ws.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            let value: Value =
                                serde_json::from_str(&text).unwrap_or(Value::Null);
                            if value["type"] == "call_service" {
                                let reply = json!({
                                    "id": value["id"],
                                    "type": "result",
                                    "success": true,
                                    "result": null
                                });
                                let _ = calls_tx.send(value);
                                if ws.send(Message::Text(reply.to_string())).await.is_err() {
                                    break 'session;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break 'session,
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break 'session,
                    },
                    Some(()) = kill_rx.recv() => break 'session,
                }
            }
        }
    });

    MockHass {
        addr,
        calls: calls_rx,
        kill: kill_tx,
        ready: ready_rx,
    }
}

// ── Test helpers ──────────────────────────────────────────────────────────────

fn test_config(kodi: &MockKodi, hass: &MockHass) -> BridgeConfig {
    BridgeConfig {
        kodi_address: "127.0.0.1".to_string(),
        kodi_ws_port: kodi.addr.port(),
        // The keymap reload is fire-and-forget; pointing it at a closed port
        // exercises the "failure is logged, not fatal" path on every run.
        kodi_http_port: 9,
        kodi_username: "kodi".to_string(),
        kodi_password: "secret".to_string(),
        home_address: format!("ws://127.0.0.1:{}", hass.addr.port()),
        home_ssl: false,
        home_token: "test-token".to_string(),
        ping_interval_secs: 30,
    }
}

fn notify_frame(trigger: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "Other.NotifyAll",
        "params": {"sender": "kodi2home", "data": {"trigger": trigger}}
    })
    .to_string()
}

/// Waits for the next handshake-completion signal from a mock server.
async fn await_ready(ready: &mut mpsc::UnboundedReceiver<()>, what: &str) {
    timeout(Duration::from_secs(10), ready.recv())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .unwrap_or_else(|| panic!("{what} mock server ended"));
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_matching_notification_forwarded_exactly_once() {
    let mut kodi = spawn_mock_kodi().await;
    let mut hass = spawn_mock_hass("test-token").await;
    let running = Arc::new(AtomicBool::new(true));
    let bridge = tokio::spawn(run_bridge(test_config(&kodi, &hass), Arc::clone(&running)));

    await_ready(&mut kodi.ready, "kodi handshake").await;
    await_ready(&mut hass.ready, "home assistant auth").await;
    // Give the bridge a moment to process its own side of both handshakes.
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Unrelated traffic first: a player notification and a foreign sender.
    // In-order delivery means that if either produced a trigger request, it
    // would reach the mock before the real one below.
    kodi.notify
        .send(
            json!({
                "jsonrpc": "2.0",
                "method": "Player.OnPlay",
                "params": {"sender": "xbmc", "data": {"item": {"type": "movie"}}}
            })
            .to_string(),
        )
        .unwrap();
    kodi.notify
        .send(
            json!({
                "jsonrpc": "2.0",
                "method": "Other.NotifyAll",
                "params": {"sender": "someoneelse", "data": {"trigger": "automation.nope"}}
            })
            .to_string(),
        )
        .unwrap();
    kodi.notify.send(notify_frame("automation.volume_up")).unwrap();

    let call = timeout(Duration::from_secs(5), hass.calls.recv())
        .await
        .expect("expected a trigger request")
        .expect("mock hass ended");
    assert_eq!(call["type"], "call_service");
    assert_eq!(call["domain"], "automation");
    assert_eq!(call["service"], "trigger");
    assert_eq!(call["service_data"]["entity_id"], "automation.volume_up");

    // Exactly one request — nothing else trickles in.
    assert!(
        timeout(Duration::from_millis(500), hass.calls.recv())
            .await
            .is_err(),
        "unrelated frames must not produce trigger requests"
    );

    running.store(false, Ordering::Relaxed);
    bridge.abort();
}

#[tokio::test]
async fn test_hub_outage_drops_triggers_until_reconnect() {
    let mut kodi = spawn_mock_kodi().await;
    let mut hass = spawn_mock_hass("test-token").await;
    let running = Arc::new(AtomicBool::new(true));
    let bridge = tokio::spawn(run_bridge(test_config(&kodi, &hass), Arc::clone(&running)));

    await_ready(&mut kodi.ready, "kodi handshake").await;
    await_ready(&mut hass.ready, "home assistant auth").await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Prove the pipeline is live before the outage.
    kodi.notify.send(notify_frame("automation.before")).unwrap();
    let call = timeout(Duration::from_secs(5), hass.calls.recv())
        .await
        .expect("pre-outage forward")
        .expect("mock hass ended");
    assert_eq!(call["service_data"]["entity_id"], "automation.before");

    // Hub drops mid-session.
    hass.kill.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await; // bridge notices the loss

    // Triggers arriving during the outage are dropped — and must not stall
    // the Kodi receive loop.
    for n in 1..=3 {
        kodi.notify
            .send(notify_frame(&format!("automation.dropped_{n}")))
            .unwrap();
    }

    // The bridge reconnects on its own after the backoff delay.
    await_ready(&mut hass.ready, "home assistant reconnect").await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    kodi.notify.send(notify_frame("automation.fourth")).unwrap();

    let call = timeout(Duration::from_secs(5), hass.calls.recv())
        .await
        .expect("post-reconnect forward")
        .expect("mock hass ended");
    assert_eq!(call["service_data"]["entity_id"], "automation.fourth");

    // The outage-time triggers are gone for good — no replay after reconnect.
    assert!(
        timeout(Duration::from_millis(500), hass.calls.recv())
            .await
            .is_err(),
        "dropped triggers must not be queued and replayed"
    );

    running.store(false, Ordering::Relaxed);
    bridge.abort();
}

#[tokio::test]
async fn test_kodi_connection_survives_repeated_losses() {
    let mut kodi = spawn_mock_kodi().await;
    let mut hass = spawn_mock_hass("test-token").await;
    let running = Arc::new(AtomicBool::new(true));
    let bridge = tokio::spawn(run_bridge(test_config(&kodi, &hass), Arc::clone(&running)));

    await_ready(&mut kodi.ready, "kodi handshake").await;
    await_ready(&mut hass.ready, "home assistant auth").await;

    // Two consecutive losses; the supervisor must re-handshake after each.
    kodi.kill.send(()).unwrap();
    await_ready(&mut kodi.ready, "first kodi reconnect").await;

    kodi.kill.send(()).unwrap();
    await_ready(&mut kodi.ready, "second kodi reconnect").await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // The message stream restarts transparently across epochs.
    kodi.notify.send(notify_frame("automation.recovered")).unwrap();

    let call = timeout(Duration::from_secs(5), hass.calls.recv())
        .await
        .expect("forward after repeated reconnects")
        .expect("mock hass ended");
    assert_eq!(call["service_data"]["entity_id"], "automation.recovered");

    running.store(false, Ordering::Relaxed);
    bridge.abort();
}
