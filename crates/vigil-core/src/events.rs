//! Wire frame types, event envelope, and channel naming for real-time delivery.
//!
//! Alert activity flows from producers (REST handlers, monitoring ingest)
//! through the message bus to every API node, which fans frames out to its
//! local WebSocket subscribers. The types here define both legs: the
//! [`AlertEvent`] envelope published on the bus and the [`ServerFrame`]
//! JSON delivered to subscribers.
//!
//! ## Wire Format (WebSocket)
//!
//! ```text
//! {"type":"alert_created","data":{"id":"...","patient_id":"...","status":"open",...}}
//! {"type":"pong","data":{"ts":1756000000000}}
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AlertStatus, ClinicalAlert, PatientStatus};

// ============================================================================
// Frame Types
// ============================================================================

/// Frames accepted from a WebSocket subscriber.
///
/// Anything that does not parse into this enum is ignored; subscribers are
/// read-mostly and the inbound surface is deliberately tiny.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Application-level liveness probe; answered with a `pong` frame.
    Ping,
}

/// Frames delivered to a WebSocket subscriber.
///
/// Serialized as JSON with a `type` tag and a `data` payload, e.g.
/// `{"type":"patient_status_changed","data":{"patient_id":"...","status":"critical"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Liveness reply; also the first frame sent on every new session.
    Pong { ts: i64 },
    /// A new alert was raised. Carries the full alert record.
    AlertCreated(ClinicalAlert),
    /// An alert moved to a new lifecycle status.
    AlertStatusChanged {
        alert_id: Uuid,
        patient_id: Uuid,
        status: AlertStatus,
    },
    /// A patient's coarse condition changed.
    PatientStatusChanged {
        patient_id: Uuid,
        status: PatientStatus,
    },
}

impl ServerFrame {
    /// Returns the frame kind (the wire `type` tag).
    pub fn kind(&self) -> &'static str {
        match self {
            ServerFrame::Pong { .. } => "pong",
            ServerFrame::AlertCreated(_) => "alert_created",
            ServerFrame::AlertStatusChanged { .. } => "alert_status_changed",
            ServerFrame::PatientStatusChanged { .. } => "patient_status_changed",
        }
    }

    /// A `pong` frame stamped with the current unix-millisecond time.
    pub fn pong_now() -> Self {
        ServerFrame::Pong {
            ts: chrono::Utc::now().timestamp_millis(),
        }
    }
}

// ============================================================================
// Event Envelope
// ============================================================================

/// Envelope published on the message bus.
///
/// Carries the delivery scope alongside the frame: every event belongs to
/// exactly one organization, and may optionally target a single operator
/// within it. Subscribing nodes use the scope to pick the bus channel and
/// to fan out only to matching local sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub organization_id: Uuid,
    /// When set, the event is delivered only to this operator's sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<Uuid>,
    pub frame: ServerFrame,
}

impl AlertEvent {
    /// Event for every operator in an organization.
    pub fn broadcast(organization_id: Uuid, frame: ServerFrame) -> Self {
        Self {
            organization_id,
            operator_id: None,
            frame,
        }
    }

    /// Event for a single operator's sessions.
    pub fn direct(organization_id: Uuid, operator_id: Uuid, frame: ServerFrame) -> Self {
        Self {
            organization_id,
            operator_id: Some(operator_id),
            frame,
        }
    }

    /// Bus channel this event is published on.
    pub fn channel(&self, namespace: &str) -> String {
        match self.operator_id {
            Some(operator_id) => operator_channel(namespace, self.organization_id, operator_id),
            None => org_channel(namespace, self.organization_id),
        }
    }
}

// ============================================================================
// Channel Naming
// ============================================================================

/// Channel carrying all events for one organization: `<ns>:<org>`.
pub fn org_channel(namespace: &str, organization_id: Uuid) -> String {
    format!("{}:{}", namespace, organization_id)
}

/// Channel carrying events for one operator: `<ns>:<org>:<operator>`.
pub fn operator_channel(namespace: &str, organization_id: Uuid, operator_id: Uuid) -> String {
    format!("{}:{}:{}", namespace, organization_id, operator_id)
}

/// Pattern matching every channel in the namespace: `<ns>:*`.
pub fn wildcard_channel(namespace: &str) -> String {
    format!("{}:*", namespace)
}

/// Delivery scope parsed back out of a bus channel name.
///
/// The subscription bridge listens on the wildcard pattern and recovers
/// the scope from each message's channel rather than trusting the payload
/// alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelKey {
    pub organization_id: Uuid,
    pub operator_id: Option<Uuid>,
}

impl ChannelKey {
    /// Parse `<ns>:<org>` or `<ns>:<org>:<operator>`.
    ///
    /// Returns `None` for foreign namespaces, malformed UUIDs, or extra
    /// segments.
    pub fn parse(namespace: &str, channel: &str) -> Option<Self> {
        let rest = channel.strip_prefix(namespace)?.strip_prefix(':')?;
        let mut segments = rest.split(':');

        let organization_id = segments.next()?.parse().ok()?;
        let operator_id = match segments.next() {
            Some(segment) => Some(segment.parse().ok()?),
            None => None,
        };
        if segments.next().is_some() {
            return None;
        }

        Some(Self {
            organization_id,
            operator_id,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
