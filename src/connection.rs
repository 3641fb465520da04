//! # Stage: Connection Manager
//!
//! ## Responsibility
//! Own the single Pusher subscription for the current channel: resolve the
//! chatroom id, open the socket, subscribe, forward raw frames, and reconnect
//! with bounded linear backoff when anything fails.
//!
//! ## Guarantees
//! - At most one supervisor task is alive; `connect` on a healthy connection
//!   to the same channel is a no-op
//! - A new `connect`/`reconnect` supersedes the previous supervisor, including
//!   any reconnect it had scheduled
//! - Every event is tagged with the generation of the supervisor that sent
//!   it, so consumers can drop events from superseded connections
//! - After `max_attempts` consecutive failures a single `GaveUp` is sent and
//!   the supervisor exits
//!
//! ## NOT Responsible For
//! - Interpreting frames (see `decoder`)
//! - Authentication (subscriptions are public)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::backoff::{BackoffDecision, ReconnectPolicy};
use crate::config::ConnectionConfig;
use crate::error::RouletteError;
use crate::lookup::RoomLookup;

pub const GIVE_UP_STATUS: &str =
    "Failed to connect after multiple attempts. Please restart the session.";

const PUSHER_PING_EVENT: &str = "pusher:ping";

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Raw text frames from an open subscription. The stream ends when the
/// connection closes; an `Err` item means it broke.
pub type FrameStream = BoxStream<'static, Result<String, RouletteError>>;

/// Opens a subscription for a room id.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, room_id: &str) -> BoxFuture<'static, Result<FrameStream, RouletteError>>;
}

/// The Pusher subscribe message for a Kick chatroom.
pub fn subscribe_message(room_id: &str) -> String {
    serde_json::json!({
        "event": "pusher:subscribe",
        "data": {
            "auth": "",
            "channel": format!("chatrooms.{room_id}.v2"),
        },
    })
    .to_string()
}

fn is_pusher_ping(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("event").and_then(|e| e.as_str()).map(|e| e == PUSHER_PING_EVENT))
        .unwrap_or(false)
}

/// WebSocket transport against a Pusher endpoint.
#[derive(Debug, Clone)]
pub struct PusherTransport {
    url: String,
}

impl PusherTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Transport for PusherTransport {
    fn open(&self, room_id: &str) -> BoxFuture<'static, Result<FrameStream, RouletteError>> {
        let url = self.url.clone();
        let subscribe = subscribe_message(room_id);
        Box::pin(async move {
            let (mut ws, _resp) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| RouletteError::Transport(e.to_string()))?;
            ws.send(WsMessage::Text(subscribe))
                .await
                .map_err(|e| RouletteError::Transport(e.to_string()))?;

            let frames = futures_util::stream::unfold(ws, |mut ws| async move {
                loop {
                    match ws.next().await? {
                        Ok(WsMessage::Text(text)) => {
                            if is_pusher_ping(&text) {
                                let pong = serde_json::json!({"event": "pusher:pong", "data": {}});
                                if let Err(e) = ws.send(WsMessage::Text(pong.to_string())).await {
                                    return Some((Err(RouletteError::Transport(e.to_string())), ws));
                                }
                                continue;
                            }
                            return Some((Ok(text), ws));
                        }
                        Ok(WsMessage::Close(_)) => return None,
                        Ok(_) => continue, // binary / ping / pong frames
                        Err(e) => {
                            return Some((Err(RouletteError::Transport(e.to_string())), ws))
                        }
                    }
                }
            });
            Ok(frames.boxed())
        })
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEventKind {
    /// Human-readable status for the display.
    Status { text: String, connected: bool },
    Frame(String),
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// Terminal: no further attempts will be made.
    GaveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub generation: u64,
    pub kind: ConnectionEventKind,
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

pub struct ConnectionManager {
    config: ConnectionConfig,
    lookup: Arc<dyn RoomLookup>,
    transport: Arc<dyn Transport>,
    tx: UnboundedSender<ConnectionEvent>,
    generation: u64,
    channel: Option<String>,
    supervisor: Option<JoinHandle<()>>,
    healthy: Arc<AtomicBool>,
}

impl ConnectionManager {
    /// Create a manager and the stream its events arrive on.
    pub fn new(
        config: ConnectionConfig,
        lookup: Arc<dyn RoomLookup>,
        transport: Arc<dyn Transport>,
    ) -> (Self, UnboundedReceiverStream<ConnectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Self {
            config,
            lookup,
            transport,
            tx,
            generation: 0,
            channel: None,
            supervisor: None,
            healthy: Arc::new(AtomicBool::new(false)),
        };
        (manager, UnboundedReceiverStream::new(rx))
    }

    /// Generation of the current supervisor. Events with any other
    /// generation are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// True while the current supervisor holds an open subscription.
    pub fn is_connected(&self) -> bool {
        self.supervisor_alive() && self.healthy.load(Ordering::Acquire)
    }

    fn supervisor_alive(&self) -> bool {
        self.supervisor
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Connect to `channel` unless a healthy connection to it already
    /// exists. Returns whether a new supervisor was started.
    pub fn connect(&mut self, channel: &str) -> bool {
        if self.channel.as_deref() == Some(channel) && self.is_connected() {
            debug!(channel, "connect ignored, already connected");
            return false;
        }
        self.reconnect(channel);
        true
    }

    /// Drop any existing connection or pending retry and start over with a
    /// fresh backoff ramp.
    pub fn reconnect(&mut self, channel: &str) {
        self.disconnect();
        self.generation += 1;
        self.channel = Some(channel.to_string());
        let healthy = Arc::new(AtomicBool::new(false));
        self.healthy = Arc::clone(&healthy);

        let supervisor = Supervisor {
            generation: self.generation,
            channel: channel.to_string(),
            lookup: Arc::clone(&self.lookup),
            transport: Arc::clone(&self.transport),
            policy: ReconnectPolicy::new(self.config.base_delay, self.config.max_attempts),
            tx: self.tx.clone(),
            healthy,
        };
        info!(channel, generation = self.generation, "starting connection supervisor");
        self.supervisor = Some(tokio::spawn(supervisor.run()));
    }

    /// Stop the supervisor, closing its socket and cancelling any retry.
    pub fn disconnect(&mut self) {
        if let Some(handle) = self.supervisor.take() {
            handle.abort();
        }
        self.healthy.store(false, Ordering::Release);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("generation", &self.generation)
            .field("channel", &self.channel)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Supervisor task
// ---------------------------------------------------------------------------

struct Supervisor {
    generation: u64,
    channel: String,
    lookup: Arc<dyn RoomLookup>,
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    tx: UnboundedSender<ConnectionEvent>,
    healthy: Arc<AtomicBool>,
}

impl Supervisor {
    fn emit(&self, kind: ConnectionEventKind) -> bool {
        self.tx
            .send(ConnectionEvent {
                generation: self.generation,
                kind,
            })
            .is_ok()
    }

    fn status(&self, text: impl Into<String>, connected: bool) -> bool {
        self.emit(ConnectionEventKind::Status {
            text: text.into(),
            connected,
        })
    }

    async fn run(mut self) {
        loop {
            if !self.attempt().await {
                return;
            }
            match self.policy.on_failure() {
                BackoffDecision::Retry { attempt, delay } => {
                    info!(
                        channel = %self.channel,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "scheduling reconnect"
                    );
                    if !self.emit(ConnectionEventKind::ReconnectScheduled { attempt, delay }) {
                        return;
                    }
                    tokio::time::sleep(delay).await;
                }
                BackoffDecision::GiveUp => {
                    error!(
                        channel = %self.channel,
                        attempts = self.policy.attempts(),
                        "giving up on connection"
                    );
                    self.status(GIVE_UP_STATUS, false);
                    self.emit(ConnectionEventKind::GaveUp);
                    return;
                }
            }
        }
    }

    /// One lookup + connect + read cycle. Returns `false` when the receiver
    /// is gone and the supervisor should exit.
    async fn attempt(&mut self) -> bool {
        let room_id = match self.lookup.lookup(&self.channel).await {
            Ok(id) => id,
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "chatroom lookup failed");
                return self.status(
                    format!("Failed to connect to {} chat. Retrying...", self.channel),
                    false,
                );
            }
        };

        let mut frames = match self.transport.open(&room_id).await {
            Ok(frames) => frames,
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "websocket connect failed");
                return self.status("WebSocket error. Retrying...", false);
            }
        };

        self.policy.reset();
        self.healthy.store(true, Ordering::Release);
        info!(channel = %self.channel, room_id = %room_id, "subscribed");
        if !self.status(format!("Connected to {} chat", self.channel), true) {
            return false;
        }

        while let Some(item) = frames.next().await {
            match item {
                Ok(frame) => {
                    if !self.emit(ConnectionEventKind::Frame(frame)) {
                        return false;
                    }
                }
                Err(e) => {
                    warn!(channel = %self.channel, error = %e, "websocket error");
                    self.status("WebSocket error. Retrying...", false);
                    break;
                }
            }
        }

        self.healthy.store(false, Ordering::Release);
        info!(channel = %self.channel, "connection closed");
        self.status("Disconnected. Retrying...", false)
    }
}
