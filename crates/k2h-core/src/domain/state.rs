//! Connection lifecycle state and the events handed between bridge tasks.

/// Lifecycle state of one websocket connection.
///
/// Owned exclusively by the connection supervisor that drives the socket;
/// other tasks only ever observe snapshots.  Transitions happen on socket
/// events or timer expiry:
///
/// ```text
/// Disconnected → Connecting → Authenticating → Ready
///                     ↑                          │ socket close / read error
///                     └──────── Reconnecting ←───┘
///                       (backoff wait, then retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, no attempt in progress.  Initial and final state.
    Disconnected,
    /// Transport connect in progress.
    Connecting,
    /// Transport is open; the endpoint's auth handshake is in progress.
    Authenticating,
    /// Transport open and authenticated; `send` is allowed.
    Ready,
    /// A previous attempt or session failed; waiting out the backoff delay.
    Reconnecting,
}

impl ConnectionState {
    /// `true` only for [`ConnectionState::Ready`] — the one state in which the
    /// underlying transport is open and authenticated.
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }
}

/// Events a connection supervisor emits to its consumer.
///
/// Delivered over a single-producer/single-consumer channel, in order within
/// one connection epoch.  `Ready` and `Lost` bracket each epoch; `Message`
/// carries one raw inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The connection completed its handshake and entered `Ready`.
    Ready,
    /// The connection left `Ready` (socket closed, read error, failed ping).
    Lost,
    /// One inbound text frame, exactly as received on the wire.
    Message(String),
}

/// A notification parsed out of the media-center traffic, carrying the
/// automation trigger to forward.
///
/// Transient and fire-and-forget: it exists for the duration of one forward
/// operation and is never retried or queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    /// Sender tag from the notification envelope (e.g. `"kodi2home"`).
    pub sender: String,
    /// JSON-RPC method the notification arrived on.
    pub method: String,
    /// Opaque automation identifier to trigger on the hub.
    pub trigger: String,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
