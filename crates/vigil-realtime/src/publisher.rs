//! Redis publisher for alert delivery events.
//!
//! Publishes serialized frames onto per-organization (or per-operator) bus
//! channels so every API node's subscription bridge can fan them out to its
//! local sessions.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `REDIS_ENABLED`: Set to "false" to disable publishing (default: true)
//! - `REDIS_URL`: Redis connection URL (default: redis://localhost:6379)
//! - `ALERT_CHANNEL_NAMESPACE`: Bus channel namespace (default: alerts)

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vigil_core::{
    defaults, AlertEvent, ClinicalAlert, Error, PatientStatus, Result, ServerFrame,
};

/// Alert event publisher backed by Redis.
#[derive(Clone)]
pub struct AlertPublisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    /// Redis connection manager (None if disabled or unreachable).
    connection: RwLock<Option<ConnectionManager>>,
    /// Bus channel namespace.
    namespace: String,
    /// Whether publishing is enabled.
    enabled: bool,
}

impl AlertPublisher {
    /// Create a new publisher from environment configuration.
    ///
    /// Reads:
    /// - `REDIS_ENABLED` (default: true)
    /// - `REDIS_URL` (default: redis://localhost:6379)
    /// - `ALERT_CHANNEL_NAMESPACE` (default: alerts)
    ///
    /// A Redis that is unreachable at startup degrades to a no-op publisher
    /// rather than failing; alert state is already durable in PostgreSQL and
    /// delivery is best effort.
    pub async fn from_env() -> Self {
        let enabled = std::env::var("REDIS_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let namespace = std::env::var("ALERT_CHANNEL_NAMESPACE")
            .unwrap_or_else(|_| defaults::CHANNEL_NAMESPACE.to_string());

        let connection = if enabled {
            match redis::Client::open(redis_url.as_str()) {
                Ok(client) => match ConnectionManager::new(client).await {
                    Ok(conn) => {
                        info!(
                            subsystem = "realtime",
                            component = "publisher",
                            namespace = %namespace,
                            "Alert bus publisher connected"
                        );
                        Some(conn)
                    }
                    Err(e) => {
                        warn!("Failed to connect to Redis, alert publishing disabled: {}", e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Invalid Redis URL, alert publishing disabled: {}", e);
                    None
                }
            }
        } else {
            info!("Alert bus publisher disabled via REDIS_ENABLED=false");
            None
        };

        Self {
            inner: Arc::new(PublisherInner {
                connection: RwLock::new(connection),
                namespace,
                enabled,
            }),
        }
    }

    /// Create a disabled publisher (for testing or when Redis unavailable).
    pub fn disabled() -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                connection: RwLock::new(None),
                namespace: defaults::CHANNEL_NAMESPACE.to_string(),
                enabled: false,
            }),
        }
    }

    /// Check if publishing is enabled and connected.
    pub async fn is_connected(&self) -> bool {
        self.inner.enabled && self.inner.connection.read().await.is_some()
    }

    /// The bus channel namespace this publisher writes into.
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Publish one event onto its bus channel.
    ///
    /// A disabled or degraded publisher skips silently; an actual send
    /// failure surfaces as `Error::Bus`.
    pub async fn publish(&self, event: &AlertEvent) -> Result<()> {
        let channel = event.channel(&self.inner.namespace);
        let payload = serde_json::to_string(&event.frame)?;

        let mut conn_guard = self.inner.connection.write().await;
        let conn = match conn_guard.as_mut() {
            Some(c) => c,
            None => {
                debug!(
                    subsystem = "realtime",
                    component = "publisher",
                    channel = %channel,
                    "Publish skipped, bus disabled"
                );
                return Ok(());
            }
        };

        let receivers: i64 = conn
            .publish(&channel, payload)
            .await
            .map_err(|e| Error::Bus(e.to_string()))?;

        debug!(
            subsystem = "realtime",
            component = "publisher",
            channel = %channel,
            frame_kind = event.frame.kind(),
            receivers,
            "Event published"
        );
        Ok(())
    }

    /// Announce a newly created alert to its organization.
    ///
    /// Fire-and-forget: by the time this runs the alert row is committed,
    /// so a bus failure is logged and swallowed rather than propagated.
    pub async fn publish_alert_created(&self, alert: &ClinicalAlert) {
        let event = AlertEvent::broadcast(
            alert.organization_id,
            ServerFrame::AlertCreated(alert.clone()),
        );
        self.publish_or_warn(event).await;
    }

    /// Announce an alert status change to its organization.
    pub async fn publish_alert_status_changed(&self, alert: &ClinicalAlert) {
        let event = AlertEvent::broadcast(
            alert.organization_id,
            ServerFrame::AlertStatusChanged {
                alert_id: alert.id,
                patient_id: alert.patient_id,
                status: alert.status,
            },
        );
        self.publish_or_warn(event).await;
    }

    /// Announce a patient condition change to an organization.
    pub async fn publish_patient_status_changed(
        &self,
        organization_id: Uuid,
        patient_id: Uuid,
        status: PatientStatus,
    ) {
        let event = AlertEvent::broadcast(
            organization_id,
            ServerFrame::PatientStatusChanged { patient_id, status },
        );
        self.publish_or_warn(event).await;
    }

    async fn publish_or_warn(&self, event: AlertEvent) {
        if let Err(e) = self.publish(&event).await {
            warn!(
                subsystem = "realtime",
                component = "publisher",
                organization_id = %event.organization_id,
                frame_kind = event.frame.kind(),
                error = %e,
                "Failed to publish alert event"
            );
        }
    }
}
