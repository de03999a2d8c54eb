//! Alert lifecycle and patient status handlers.
//!
//! Every route is organization-scoped through the authenticated session;
//! an alert belonging to another organization is indistinguishable from a
//! missing one. Writes commit to Postgres before the matching event is
//! published, so a bus outage degrades liveness but never durability.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use vigil_core::{
    AlertListQuery, AlertPage, AlertRepository, AlertTransition, ClinicalAlert,
    CreateAlertRequest, TransitionAlertRequest, UpdatePatientStatusRequest,
};

use crate::{ApiError, AppState, RequireOperator};

/// Raise a new clinical alert.
///
/// `POST /api/v1/alerts`
///
/// # Returns
/// - `201 Created`: the stored alert, status `open`
/// - `400 Bad Request`: empty `rule_key` or `title`
/// - `401 Unauthorized`: missing or invalid token
/// - `403 Forbidden`: patient-role token
pub async fn create_alert(
    RequireOperator { session }: RequireOperator,
    State(state): State<AppState>,
    Json(req): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<ClinicalAlert>), ApiError> {
    if req.rule_key.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "rule_key must not be empty".to_string(),
        ));
    }
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let alert = state.db.alerts.insert(session.organization_id, req).await?;
    state.publisher.publish_alert_created(&alert).await;

    Ok((StatusCode::CREATED, Json(alert)))
}

/// List alerts in the caller's organization, newest first.
///
/// `GET /api/v1/alerts`
///
/// # Query Parameters
/// - `status`: filter by lifecycle status
/// - `severity`: filter by severity
/// - `patient_id`: filter by patient
/// - `limit`: page size (default 50, capped at 200)
/// - `offset`: rows to skip (default 0)
///
/// # Returns
/// - `200 OK`: a page of alerts with the unpaginated total
pub async fn list_alerts(
    RequireOperator { session }: RequireOperator,
    State(state): State<AppState>,
    Query(query): Query<AlertListQuery>,
) -> Result<Json<AlertPage>, ApiError> {
    let page = state.db.alerts.list(session.organization_id, query).await?;
    Ok(Json(page))
}

/// Fetch a single alert by ID.
///
/// `GET /api/v1/alerts/:id`
///
/// # Returns
/// - `200 OK`: the alert
/// - `404 Not Found`: unknown ID, or an alert owned by another organization
pub async fn get_alert(
    RequireOperator { session }: RequireOperator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClinicalAlert>, ApiError> {
    let alert = state.db.alerts.fetch(session.organization_id, id).await?;
    Ok(Json(alert))
}

/// Acknowledge an open alert.
///
/// `PATCH /api/v1/alerts/:id/acknowledge`
///
/// # Returns
/// - `200 OK`: the updated alert with `acknowledged_at` stamped
/// - `404 Not Found`: unknown or foreign alert
/// - `409 Conflict`: the alert is not `open`; the body names its current status
pub async fn acknowledge_alert(
    RequireOperator { session }: RequireOperator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<TransitionAlertRequest>>,
) -> Result<Json<ClinicalAlert>, ApiError> {
    apply_transition(
        &state,
        session.organization_id,
        id,
        AlertTransition::Acknowledge,
        body,
    )
    .await
}

/// Resolve an alert from any live status.
///
/// `PATCH /api/v1/alerts/:id/resolve`
///
/// # Returns
/// - `200 OK`: the updated alert
/// - `404 Not Found`: unknown or foreign alert
/// - `409 Conflict`: the alert is already terminal
pub async fn resolve_alert(
    RequireOperator { session }: RequireOperator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<TransitionAlertRequest>>,
) -> Result<Json<ClinicalAlert>, ApiError> {
    apply_transition(
        &state,
        session.organization_id,
        id,
        AlertTransition::Resolve,
        body,
    )
    .await
}

/// Escalate an open or acknowledged alert.
///
/// `PATCH /api/v1/alerts/:id/escalate`
///
/// # Returns
/// - `200 OK`: the updated alert
/// - `404 Not Found`: unknown or foreign alert
/// - `409 Conflict`: the alert is terminal or already escalated
pub async fn escalate_alert(
    RequireOperator { session }: RequireOperator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<TransitionAlertRequest>>,
) -> Result<Json<ClinicalAlert>, ApiError> {
    apply_transition(
        &state,
        session.organization_id,
        id,
        AlertTransition::Escalate,
        body,
    )
    .await
}

/// Shared transition path: guarded status update, then event publication.
async fn apply_transition(
    state: &AppState,
    organization_id: Uuid,
    id: Uuid,
    transition: AlertTransition,
    body: Option<Json<TransitionAlertRequest>>,
) -> Result<Json<ClinicalAlert>, ApiError> {
    let note = body.and_then(|Json(b)| b.note);
    let alert = state
        .db
        .alerts
        .transition(organization_id, id, transition, note.as_deref())
        .await?;
    state.publisher.publish_alert_status_changed(&alert).await;
    Ok(Json(alert))
}

/// Broadcast a patient condition change to the organization's live sessions.
///
/// `POST /api/v1/patients/:id/status`
///
/// Patient condition is tracked by the upstream monitoring system, not here;
/// the endpoint accepts the change and fans it out without storing it.
///
/// # Returns
/// - `202 Accepted`: the change was queued for delivery
/// - `401 Unauthorized` / `403 Forbidden`: auth failures
pub async fn update_patient_status(
    RequireOperator { session }: RequireOperator,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePatientStatusRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    state
        .publisher
        .publish_patient_status_changed(session.organization_id, id, req.status)
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted" })),
    ))
}
