//! Reconnecting alert feed over a WebSocket.
//!
//! One feed serves one dashboard process. It dials the vigil-api `/ws`
//! endpoint, forwards every received frame to in-process subscribers,
//! keeps a bounded ring of recent events for display, and re-dials with
//! exponential backoff when the connection drops. Missed frames are not
//! replayed; the frame stream is a hint to refetch over REST.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use vigil_core::{defaults, Backoff, ClientFrame, Error, Result, ServerFrame};

/// Connection state of the feed, for the dashboard's status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection and no dial in progress.
    Disconnected,
    /// A dial attempt is in progress.
    Connecting,
    /// The socket is up and frames are flowing.
    Connected,
    /// The last dial attempt failed; the feed waits out the backoff.
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

/// Configuration for the alert feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket endpoint of a vigil-api node.
    pub url: String,
    /// Bearer token, sent as a `token` query parameter.
    pub token: String,
    /// Initial re-dial delay after a lost connection.
    pub backoff_base: Duration,
    /// Upper bound on the re-dial delay.
    pub backoff_cap: Duration,
    /// Number of recent events kept for display. Zero disables the ring.
    pub ring_capacity: usize,
    /// Interval between application-level ping frames.
    pub ping_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000/ws".to_string(),
            token: String::new(),
            backoff_base: Duration::from_millis(defaults::RECONNECT_BASE_DELAY_MS),
            backoff_cap: Duration::from_millis(defaults::RECONNECT_MAX_DELAY_MS),
            ring_capacity: defaults::FEED_RING_CAPACITY,
            ping_interval: Duration::from_secs(defaults::WS_KEEPALIVE_INTERVAL_SECS),
        }
    }
}

impl FeedConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `VIGIL_WS_URL` | `ws://localhost:3000/ws` | WebSocket endpoint |
    /// | `VIGIL_WS_TOKEN` | (empty) | Bearer token for the session |
    pub fn from_env() -> Self {
        let url = std::env::var("VIGIL_WS_URL")
            .unwrap_or_else(|_| "ws://localhost:3000/ws".to_string());
        let token = std::env::var("VIGIL_WS_TOKEN").unwrap_or_default();

        Self {
            url,
            token,
            ..Self::default()
        }
    }

    /// Set the WebSocket endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Set the re-dial backoff window.
    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// Set the recent-event ring capacity.
    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity;
        self
    }

    /// Set the application-level ping interval.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Dial URL with the token appended as a query parameter.
    fn feed_url(&self) -> String {
        if self.token.is_empty() {
            return self.url.clone();
        }
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}token={}", self.url, sep, self.token)
    }
}

/// Handle for observing and controlling a running feed.
pub struct FeedHandle {
    status_rx: watch::Receiver<ConnectionStatus>,
    frames_tx: broadcast::Sender<ServerFrame>,
    ring: Arc<Mutex<VecDeque<ServerFrame>>>,
    shutdown_tx: mpsc::Sender<()>,
}

impl FeedHandle {
    /// Watch receiver for the connection status indicator.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Subscribe to received frames.
    ///
    /// Pong frames are filtered out; everything else arrives in receipt
    /// order. A slow subscriber can lag and miss frames, in which case it
    /// should refetch over REST rather than expect a replay.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerFrame> {
        self.frames_tx.subscribe()
    }

    /// Snapshot of the most recent events, oldest first.
    pub async fn recent_events(&self) -> Vec<ServerFrame> {
        self.ring.lock().await.iter().cloned().collect()
    }

    /// Signal the feed to shut down gracefully.
    ///
    /// Closes the active socket if one is up, or cancels the pending
    /// reconnect timer if the feed is waiting out a backoff.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }
}

/// Reconnecting WebSocket consumer of the alert stream.
pub struct AlertFeed {
    config: FeedConfig,
    status_tx: watch::Sender<ConnectionStatus>,
    frames_tx: broadcast::Sender<ServerFrame>,
    ring: Arc<Mutex<VecDeque<ServerFrame>>>,
}

impl AlertFeed {
    /// Start the feed and return a handle for control.
    pub fn connect(config: FeedConfig) -> FeedHandle {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (frames_tx, _) = broadcast::channel(defaults::FEED_BROADCAST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let ring = Arc::new(Mutex::new(VecDeque::with_capacity(config.ring_capacity)));

        let feed = AlertFeed {
            config,
            status_tx,
            frames_tx: frames_tx.clone(),
            ring: ring.clone(),
        };
        tokio::spawn(feed.run(shutdown_rx));

        FeedHandle {
            status_rx,
            frames_tx,
            ring,
            shutdown_tx,
        }
    }

    /// Dial loop. Runs until shutdown.
    async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(
            subsystem = "client",
            component = "feed",
            url = %self.config.url,
            "Alert feed started"
        );

        let url = self.config.feed_url();
        let mut backoff = Backoff::new(self.config.backoff_base, self.config.backoff_cap);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            self.status_tx.send_replace(ConnectionStatus::Connecting);
            match connect_async(url.as_str()).await {
                Ok((mut socket, _response)) => {
                    info!(subsystem = "client", component = "feed", "Alert feed connected");
                    self.status_tx.send_replace(ConnectionStatus::Connected);
                    backoff.reset();

                    if self.pump(&mut socket, &mut shutdown_rx).await {
                        break;
                    }
                    self.status_tx.send_replace(ConnectionStatus::Disconnected);
                }
                Err(e) => {
                    warn!(
                        subsystem = "client",
                        component = "feed",
                        error = %e,
                        "Alert feed connect failed"
                    );
                    self.status_tx.send_replace(ConnectionStatus::Error);
                }
            }

            let delay = backoff.next_delay();
            debug!(
                subsystem = "client",
                component = "feed",
                attempt = backoff.attempt(),
                delay_ms = delay.as_millis() as u64,
                "Re-dialing after backoff"
            );
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = sleep(delay) => {}
            }
        }

        self.status_tx.send_replace(ConnectionStatus::Disconnected);
        info!(subsystem = "client", component = "feed", "Alert feed stopped");
    }

    /// Read frames until the socket drops or shutdown is requested.
    ///
    /// Returns `true` on shutdown, `false` when the connection was lost
    /// and the caller should re-dial.
    async fn pump(
        &self,
        socket: &mut WebSocketStream<MaybeTlsStream<TcpStream>>,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> bool {
        let mut ping_interval = tokio::time::interval(self.config.ping_interval);

        loop {
            tokio::select! {
                msg = socket.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_frame(&text).await,
                        Some(Ok(Message::Close(_))) | None => {
                            info!(
                                subsystem = "client",
                                component = "feed",
                                "Feed socket closed by server"
                            );
                            return false;
                        }
                        Some(Err(e)) => {
                            warn!(
                                subsystem = "client",
                                component = "feed",
                                error = %e,
                                "Feed socket error"
                            );
                            return false;
                        }
                        // Transport ping/pong and binary frames carry nothing
                        Some(Ok(_)) => {}
                    }
                }
                _ = ping_interval.tick() => {
                    if let Ok(json) = serde_json::to_string(&ClientFrame::Ping) {
                        if socket.send(Message::Text(json)).await.is_err() {
                            return false;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    let _ = socket.close(None).await;
                    return true;
                }
            }
        }
    }

    /// Dispatch one received text frame.
    async fn handle_frame(&self, text: &str) {
        match serde_json::from_str::<ServerFrame>(text) {
            Ok(ServerFrame::Pong { ts }) => {
                let rtt_ms = chrono::Utc::now().timestamp_millis().saturating_sub(ts);
                debug!(
                    subsystem = "client",
                    component = "feed",
                    rtt_ms,
                    "Server heartbeat"
                );
            }
            Ok(frame) => {
                trace!(
                    subsystem = "client",
                    component = "feed",
                    kind = frame.kind(),
                    "Feed frame received"
                );
                self.push_recent(frame.clone()).await;
                // Err means no live subscribers; the ring still records it
                let _ = self.frames_tx.send(frame);
            }
            Err(e) => {
                debug!(
                    subsystem = "client",
                    component = "feed",
                    error = %e,
                    "Ignoring unparseable frame"
                );
            }
        }
    }

    /// Append to the display ring, dropping the oldest entry at capacity.
    async fn push_recent(&self, frame: ServerFrame) {
        if self.config.ring_capacity == 0 {
            return;
        }
        let mut ring = self.ring.lock().await;
        while ring.len() >= self.config.ring_capacity {
            ring.pop_front();
        }
        ring.push_back(frame);
    }
}
