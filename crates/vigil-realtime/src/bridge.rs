//! Redis subscription bridge feeding the session registry.
//!
//! Each API node runs one bridge. It subscribes to the wildcard pattern for
//! the alert namespace, recovers the delivery scope from every message's
//! channel name, and fans the frame out to matching local sessions. A lost
//! subscription is re-established with exponential backoff.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use vigil_core::{defaults, wildcard_channel, Backoff, ChannelKey, Error, Result, ServerFrame};

use crate::registry::ConnectionRegistry;

/// Configuration for the subscription bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Redis connection URL.
    pub redis_url: String,
    /// Bus channel namespace.
    pub namespace: String,
    /// Whether to run the subscription.
    pub enabled: bool,
    /// Initial reconnect delay after a lost subscription.
    pub reconnect_base: Duration,
    /// Upper bound on the reconnect delay.
    pub reconnect_cap: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            namespace: defaults::CHANNEL_NAMESPACE.to_string(),
            enabled: true,
            reconnect_base: Duration::from_millis(defaults::RECONNECT_BASE_DELAY_MS),
            reconnect_cap: Duration::from_millis(defaults::RECONNECT_MAX_DELAY_MS),
        }
    }
}

impl BridgeConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `REDIS_ENABLED` | `true` | Enable/disable the bus subscription |
    /// | `REDIS_URL` | `redis://localhost:6379` | Redis connection URL |
    /// | `ALERT_CHANNEL_NAMESPACE` | `alerts` | Bus channel namespace |
    pub fn from_env() -> Self {
        let enabled = std::env::var("REDIS_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let namespace = std::env::var("ALERT_CHANNEL_NAMESPACE")
            .unwrap_or_else(|_| defaults::CHANNEL_NAMESPACE.to_string());

        Self {
            redis_url,
            namespace,
            enabled,
            ..Self::default()
        }
    }

    /// Set the Redis URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Set the channel namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Enable or disable the subscription.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the reconnect backoff window.
    pub fn with_reconnect(mut self, base: Duration, cap: Duration) -> Self {
        self.reconnect_base = base;
        self.reconnect_cap = cap;
        self
    }
}

/// Handle for controlling a running bridge.
pub struct BridgeHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl BridgeHandle {
    /// Signal the bridge to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }
}

/// Bus subscriber that routes events into the local session registry.
pub struct SubscriptionBridge {
    registry: ConnectionRegistry,
    config: BridgeConfig,
}

impl SubscriptionBridge {
    /// Create a new bridge over the given registry.
    pub fn new(registry: ConnectionRegistry, config: BridgeConfig) -> Self {
        Self { registry, config }
    }

    /// Start the bridge and return a handle for control.
    pub fn start(self) -> BridgeHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        BridgeHandle { shutdown_tx }
    }

    /// Run the subscription loop until shut down.
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Subscription bridge is disabled, not starting");
            return;
        }

        let pattern = wildcard_channel(&self.config.namespace);
        info!(
            subsystem = "realtime",
            component = "bridge",
            channel = %pattern,
            "Subscription bridge started"
        );

        let mut backoff = Backoff::new(self.config.reconnect_base, self.config.reconnect_cap);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Subscription bridge received shutdown signal");
                break;
            }

            match self.listen(&pattern, &mut backoff, shutdown_rx).await {
                Ok(()) => {
                    info!("Subscription bridge received shutdown signal");
                    break;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        subsystem = "realtime",
                        component = "bridge",
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Bus subscription lost, reconnecting"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("Subscription bridge received shutdown signal");
                            break;
                        }
                        _ = sleep(delay) => {}
                    }
                }
            }
        }

        info!("Subscription bridge stopped");
    }

    /// Subscribe and route messages until the connection drops or shutdown.
    ///
    /// Returns `Ok` only on a shutdown signal; every connection failure is
    /// an `Err` so the caller applies backoff.
    async fn listen(
        &self,
        pattern: &str,
        backoff: &mut Backoff,
        shutdown_rx: &mut mpsc::Receiver<()>,
    ) -> Result<()> {
        let client = redis::Client::open(self.config.redis_url.as_str())
            .map_err(|e| Error::Bus(format!("invalid Redis URL: {}", e)))?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| Error::Bus(e.to_string()))?;
        pubsub
            .psubscribe(pattern)
            .await
            .map_err(|e| Error::Bus(e.to_string()))?;

        debug!(
            subsystem = "realtime",
            component = "bridge",
            channel = pattern,
            "Subscribed to alert bus"
        );
        backoff.reset();

        let mut stream = pubsub.on_message();
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => return Ok(()),
                msg = stream.next() => match msg {
                    Some(msg) => {
                        let channel = msg.get_channel_name().to_string();
                        let payload: String = match msg.get_payload() {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!(channel = %channel, error = %e, "Discarding non-text bus payload");
                                continue;
                            }
                        };
                        route_message(&self.registry, &self.config.namespace, &channel, &payload)
                            .await;
                    }
                    None => return Err(Error::Bus("subscription stream ended".into())),
                }
            }
        }
    }
}

/// Route one bus message into the registry.
///
/// The channel name carries the delivery scope; messages outside the
/// namespace and payloads that do not parse as frames are dropped.
/// Returns the number of sessions the frame was handed to.
pub async fn route_message(
    registry: &ConnectionRegistry,
    namespace: &str,
    channel: &str,
    payload: &str,
) -> usize {
    let Some(key) = ChannelKey::parse(namespace, channel) else {
        debug!(channel = %channel, "Ignoring message outside alert namespace");
        return 0;
    };

    let frame: ServerFrame = match serde_json::from_str(payload) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(channel = %channel, error = %e, "Discarding malformed bus payload");
            return 0;
        }
    };

    let delivered = match key.operator_id {
        Some(operator_id) => {
            registry
                .send_to_operator(key.organization_id, operator_id, &frame)
                .await
        }
        None => registry.broadcast(key.organization_id, &frame).await,
    };

    debug!(
        subsystem = "realtime",
        component = "bridge",
        channel = %channel,
        frame_kind = frame.kind(),
        delivered,
        "Routed bus message"
    );
    delivered
}
