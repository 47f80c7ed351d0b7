//! Generic websocket connection supervisor.
//!
//! Both remote endpoints need the same lifecycle management — connect,
//! authenticate, receive, detect failure, back off, reconnect, forever — so
//! the supervisor implements it once, parameterized over an [`Endpoint`]
//! strategy that supplies the endpoint-specific transport and handshake.
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──connect──▶ Authenticating ──handshake──▶ Ready
//!      ▲                                                  │
//!      │                                        receive loop + keepalive
//!      │                                                  │ close / error
//!      └───── Reconnecting (backoff wait: 2s, 4s, … 60s) ◀┘
//! ```
//!
//! Failures during connect, handshake, or an established session are treated
//! identically: back off and retry.  A server-initiated close while `Ready`
//! (some hubs shed load that way) is a normal failure, never fatal.  The loop
//! only ends when the shared running flag clears at process shutdown.
//!
//! # Invariants
//!
//! - At most one live socket per supervisor: the loop is strictly sequential,
//!   a new attempt starts only after the previous session is torn down.
//! - Inbound frames are delivered to the consumer in wire order within one
//!   connection epoch; frames in flight at disconnect are lost, never
//!   replayed or reordered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use k2h_core::{Backoff, ConnectionEvent, ConnectionState};

/// The client-side websocket stream type shared by both endpoints.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

/// Capacity of the supervisor → consumer event channel.
const EVENT_CHANNEL_CAPACITY: usize = 128;

// ── Error types ───────────────────────────────────────────────────────────────

/// Errors raised while establishing a connection.
///
/// All variants are recovered locally by the supervisor's backoff-retry loop;
/// none of them propagate out of [`ConnectionSupervisor::start`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Socket-level connect, read, or write failure.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The endpoint rejected our credentials.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The endpoint sent something the handshake cannot make sense of.
    #[error("protocol error during handshake: {0}")]
    Protocol(String),
}

/// Errors raised by [`ConnectionSupervisor::send`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The connection is not in the `Ready` state; the message was dropped.
    #[error("connection is not ready")]
    NotConnected,

    /// The write itself failed; the session is about to be torn down.
    #[error("write failed: {0}")]
    Transport(String),
}

// ── Endpoint strategy ─────────────────────────────────────────────────────────

/// Endpoint-specific connect and authentication behaviour.
///
/// The supervisor owns *when* to connect and retry; implementations own *how*
/// to reach and greet their particular remote.
#[async_trait]
pub trait Endpoint: Send + Sync + 'static {
    /// Short name used in log messages (e.g. `"kodi"`).
    fn name(&self) -> &'static str;

    /// Opens the websocket transport (TCP connect + HTTP upgrade).
    async fn connect(&self) -> Result<WsStream, ConnectError>;

    /// Runs the endpoint's authentication handshake on a fresh transport.
    async fn authenticate(&self, ws: &mut WsStream) -> Result<(), ConnectError>;
}

// ── Supervisor ────────────────────────────────────────────────────────────────

/// Maintains exactly one websocket connection to one remote endpoint,
/// surviving transient failures indefinitely.
///
/// Construct with [`new`](Self::new), wrap in an `Arc`, then call
/// [`start`](Self::start) once to spawn the reconnect loop.  Consumers read
/// lifecycle and message events from the returned channel and submit outbound
/// frames through [`send`](Self::send).
pub struct ConnectionSupervisor<E> {
    endpoint: E,
    ping_interval: Duration,
    /// Write half of the current session; `None` whenever there is no live,
    /// authenticated socket.
    writer: Mutex<Option<WsSink>>,
    state_tx: watch::Sender<ConnectionState>,
    started: AtomicBool,
}

impl<E: Endpoint> ConnectionSupervisor<E> {
    pub fn new(endpoint: E, ping_interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            endpoint,
            ping_interval,
            writer: Mutex::new(None),
            state_tx,
            started: AtomicBool::new(false),
        }
    }

    /// Spawns the reconnect loop and returns its event stream immediately.
    ///
    /// The loop runs until `running` clears, then closes the socket and
    /// drops the sender, ending the stream.  Calling `start` again is a
    /// no-op: the supervisor keeps its one loop and the extra receiver never
    /// yields.
    pub fn start(self: Arc<Self>, running: Arc<AtomicBool>) -> mpsc::Receiver<ConnectionEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        if self.started.swap(true, Ordering::SeqCst) {
            warn!("{}: start called twice; ignoring", self.endpoint.name());
            return rx;
        }

        tokio::spawn(async move {
            self.run(running, tx).await;
        });

        rx
    }

    /// Current lifecycle state snapshot.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// A watch handle for callers that want to await state changes.
    pub fn state_stream(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Sends one text frame on the current session.
    ///
    /// Succeeds only while the connection is `Ready`.  There is no queueing:
    /// a message submitted at any other time is dropped with
    /// [`SendError::NotConnected`], and the caller decides whether that is
    /// worth more than a log line.
    pub async fn send(&self, text: String) -> Result<(), SendError> {
        if !self.state().is_ready() {
            return Err(SendError::NotConnected);
        }
        let mut guard = self.writer.lock().await;
        let sink = guard.as_mut().ok_or(SendError::NotConnected)?;
        sink.send(WsMessage::Text(text))
            .await
            .map_err(|e| SendError::Transport(e.to_string()))
    }

    // ── Reconnect loop ────────────────────────────────────────────────────────

    async fn run(&self, running: Arc<AtomicBool>, tx: mpsc::Sender<ConnectionEvent>) {
        let mut backoff = Backoff::default();

        while running.load(Ordering::Relaxed) {
            match self.establish().await {
                Ok(reader) => {
                    backoff.reset();
                    self.set_state(ConnectionState::Ready);
                    info!("{}: connection ready", self.endpoint.name());
                    if tx.send(ConnectionEvent::Ready).await.is_err() {
                        break; // consumer gone — nothing left to supervise for
                    }

                    self.receive_loop(reader, &tx, &running).await;

                    self.close_session().await;
                    self.set_state(ConnectionState::Reconnecting);
                    if tx.send(ConnectionEvent::Lost).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    self.close_session().await;
                    self.set_state(ConnectionState::Reconnecting);
                    warn!("{}: connection attempt failed: {e}", self.endpoint.name());
                }
            }

            if !running.load(Ordering::Relaxed) {
                break;
            }

            let delay = backoff.next_delay();
            info!(
                "{}: reconnecting in {}s",
                self.endpoint.name(),
                delay.as_secs()
            );
            tokio::time::sleep(delay).await;
        }

        self.close_session().await;
        self.set_state(ConnectionState::Disconnected);
        debug!("{}: supervisor stopped", self.endpoint.name());
    }

    /// One connection attempt: transport, then handshake, then stash the
    /// write half for [`send`].  Returns the read half for the receive loop.
    async fn establish(&self) -> Result<WsSource, ConnectError> {
        self.set_state(ConnectionState::Connecting);
        let mut ws = self.endpoint.connect().await?;

        self.set_state(ConnectionState::Authenticating);
        self.endpoint.authenticate(&mut ws).await?;

        let (sink, source) = ws.split();
        *self.writer.lock().await = Some(sink);
        Ok(source)
    }

    /// Pumps inbound frames to the consumer until the session dies.
    ///
    /// A keepalive ping goes out every `ping_interval`; a failed ping write
    /// counts as a dead session, which catches silent TCP failures that a
    /// pure read loop would only notice at the OS timeout.
    async fn receive_loop(
        &self,
        mut reader: WsSource,
        tx: &mpsc::Sender<ConnectionEvent>,
        running: &AtomicBool,
    ) {
        let mut keepalive = tokio::time::interval(self.ping_interval);
        keepalive.tick().await; // the first tick fires immediately; skip it

        loop {
            tokio::select! {
                frame = reader.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if tx.send(ConnectionEvent::Message(text)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(WsMessage::Ping(_))) => {
                        // tungstenite queues the pong; it goes out with the
                        // next write on the sink.
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        debug!("{}: keepalive pong", self.endpoint.name());
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(
                            "{}: server closed the connection ({frame:?})",
                            self.endpoint.name()
                        );
                        return;
                    }
                    Some(Ok(_)) => {
                        // Binary and raw frames are not part of either
                        // endpoint's protocol; skip them.
                    }
                    Some(Err(e)) => {
                        warn!("{}: read error: {e}", self.endpoint.name());
                        return;
                    }
                    None => {
                        info!("{}: connection stream ended", self.endpoint.name());
                        return;
                    }
                },
                _ = keepalive.tick() => {
                    if let Err(e) = self.ping().await {
                        warn!("{}: keepalive ping failed: {e}", self.endpoint.name());
                        return;
                    }
                }
            }

            if !running.load(Ordering::Relaxed) {
                return;
            }
        }
    }

    async fn ping(&self) -> Result<(), SendError> {
        let mut guard = self.writer.lock().await;
        let sink = guard.as_mut().ok_or(SendError::NotConnected)?;
        sink.send(WsMessage::Ping(Vec::new()))
            .await
            .map_err(|e| SendError::Transport(e.to_string()))
    }

    /// Tears down the write half, sending a best-effort Close frame.
    async fn close_session(&self) {
        let mut guard = self.writer.lock().await;
        if let Some(mut sink) = guard.take() {
            let _ = sink.close().await;
        }
    }

    fn set_state(&self, next: ConnectionState) {
        self.state_tx.send_replace(next);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
