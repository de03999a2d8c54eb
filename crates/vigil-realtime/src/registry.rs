//! In-process registry of live subscriber sessions.
//!
//! Sessions are keyed by organization, then by operator, so events can be
//! fanned out to a whole organization or narrowed to one operator's open
//! connections. Delivery never blocks: a session whose outbound buffer is
//! full has that frame dropped while other sessions still receive it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use vigil_core::{defaults, new_v7, ServerFrame};

/// A live subscriber session.
pub struct Session {
    pub session_id: Uuid,
    pub operator_id: Uuid,
    pub organization_id: Uuid,
    /// Outbound frame buffer drained by the session's write task.
    pub sender: mpsc::Sender<ServerFrame>,
}

impl Session {
    /// Create a session along with the receiving half of its outbound buffer.
    pub fn new(operator_id: Uuid, organization_id: Uuid) -> (Self, mpsc::Receiver<ServerFrame>) {
        let (sender, receiver) = mpsc::channel(defaults::SESSION_OUTBOUND_BUFFER);
        (
            Self {
                session_id: new_v7(),
                operator_id,
                organization_id,
                sender,
            },
            receiver,
        )
    }
}

/// Organization -> operator -> live sessions.
type SessionMap = HashMap<Uuid, HashMap<Uuid, Vec<Session>>>;

/// Shared registry of every live session on this node.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<SessionMap>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for delivery.
    pub async fn register(&self, session: Session) {
        let mut map = self.inner.lock().await;
        debug!(
            subsystem = "realtime",
            component = "registry",
            op = "register",
            organization_id = %session.organization_id,
            operator_id = %session.operator_id,
            session_id = %session.session_id,
            "Session registered"
        );
        map.entry(session.organization_id)
            .or_default()
            .entry(session.operator_id)
            .or_default()
            .push(session);
    }

    /// Remove a session. Removing an unknown session is a no-op.
    pub async fn unregister(&self, organization_id: Uuid, session_id: Uuid) {
        let mut map = self.inner.lock().await;
        let Some(operators) = map.get_mut(&organization_id) else {
            return;
        };

        for sessions in operators.values_mut() {
            sessions.retain(|s| s.session_id != session_id);
        }
        operators.retain(|_, sessions| !sessions.is_empty());
        if operators.is_empty() {
            map.remove(&organization_id);
        }

        debug!(
            subsystem = "realtime",
            component = "registry",
            op = "unregister",
            organization_id = %organization_id,
            session_id = %session_id,
            "Session unregistered"
        );
    }

    /// Deliver a frame to every session in an organization.
    ///
    /// Returns the number of sessions the frame was handed to.
    pub async fn broadcast(&self, organization_id: Uuid, frame: &ServerFrame) -> usize {
        let map = self.inner.lock().await;
        let Some(operators) = map.get(&organization_id) else {
            return 0;
        };

        let mut delivered = 0;
        for sessions in operators.values() {
            for session in sessions {
                if deliver(session, frame) {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Deliver a frame to one operator's sessions within an organization.
    ///
    /// Returns the number of sessions the frame was handed to.
    pub async fn send_to_operator(
        &self,
        organization_id: Uuid,
        operator_id: Uuid,
        frame: &ServerFrame,
    ) -> usize {
        let map = self.inner.lock().await;
        let Some(sessions) = map
            .get(&organization_id)
            .and_then(|operators| operators.get(&operator_id))
        else {
            return 0;
        };

        sessions.iter().filter(|s| deliver(s, frame)).count()
    }

    /// Total number of live sessions across all organizations.
    pub async fn session_count(&self) -> usize {
        let map = self.inner.lock().await;
        map.values()
            .flat_map(|operators| operators.values())
            .map(|sessions| sessions.len())
            .sum()
    }

    /// Number of live sessions within one organization.
    pub async fn organization_session_count(&self, organization_id: Uuid) -> usize {
        let map = self.inner.lock().await;
        map.get(&organization_id)
            .map(|operators| operators.values().map(|sessions| sessions.len()).sum())
            .unwrap_or(0)
    }
}

/// Hand one frame to one session without blocking.
///
/// A full buffer means the consumer is not draining; the frame is dropped
/// for that session only. A closed buffer means the session is tearing
/// down and will unregister itself.
fn deliver(session: &Session, frame: &ServerFrame) -> bool {
    match session.sender.try_send(frame.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(
                subsystem = "realtime",
                component = "registry",
                session_id = %session.session_id,
                operator_id = %session.operator_id,
                frame_kind = frame.kind(),
                "Session buffer full, dropping frame"
            );
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}
