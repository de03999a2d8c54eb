//! Core traits for vigil abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AlertListQuery, AlertPage, AlertTransition, AuthSession, ClinicalAlert, CreateAlertRequest,
};

// =============================================================================
// ALERT REPOSITORY
// =============================================================================

/// Repository for alert persistence and lifecycle transitions.
///
/// Every operation is scoped to an organization; an alert belonging to a
/// different organization is indistinguishable from a missing one.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Insert a newly raised alert in `open` status.
    async fn insert(
        &self,
        organization_id: Uuid,
        req: CreateAlertRequest,
    ) -> Result<ClinicalAlert>;

    /// Fetch an alert by ID.
    async fn fetch(&self, organization_id: Uuid, id: Uuid) -> Result<ClinicalAlert>;

    /// List alerts with filtering and pagination, newest first.
    async fn list(&self, organization_id: Uuid, query: AlertListQuery) -> Result<AlertPage>;

    /// Apply a lifecycle transition as an atomic read-modify-write.
    ///
    /// Returns the updated alert. Fails with [`crate::Error::Conflict`]
    /// when the alert's current status does not admit the transition, and
    /// with [`crate::Error::AlertNotFound`] when no such alert exists in
    /// the organization.
    async fn transition(
        &self,
        organization_id: Uuid,
        id: Uuid,
        transition: AlertTransition,
        note: Option<&str>,
    ) -> Result<ClinicalAlert>;
}

// =============================================================================
// TOKEN VERIFICATION
// =============================================================================

/// Resolves bearer tokens to authenticated sessions.
///
/// Returns `Ok(None)` for unknown or expired tokens; `Err` is reserved for
/// infrastructure failures (e.g. the token store being unreachable).
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Option<AuthSession>>;
}
