//! Alert repository: persistence and guarded lifecycle transitions.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use vigil_core::{
    defaults, new_v7, AlertListQuery, AlertPage, AlertRepository, AlertSeverity, AlertStatus,
    AlertTransition, ClinicalAlert, CreateAlertRequest, Error, Result,
};

/// PostgreSQL alert repository.
pub struct PgAlertRepository {
    pool: Pool<Postgres>,
}

impl PgAlertRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert AlertSeverity to string for database.
    fn severity_to_str(severity: AlertSeverity) -> &'static str {
        match severity {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }

    /// Convert string from database to AlertSeverity.
    fn str_to_severity(s: &str) -> AlertSeverity {
        match s {
            "info" => AlertSeverity::Info,
            "warning" => AlertSeverity::Warning,
            "critical" => AlertSeverity::Critical,
            _ => AlertSeverity::Info, // fallback
        }
    }

    /// Convert AlertStatus to string for database.
    fn status_to_str(status: AlertStatus) -> &'static str {
        match status {
            AlertStatus::Open => "open",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Escalated => "escalated",
            AlertStatus::AutoResolved => "auto_resolved",
        }
    }

    /// Convert string from database to AlertStatus.
    fn str_to_status(s: &str) -> AlertStatus {
        match s {
            "open" => AlertStatus::Open,
            "acknowledged" => AlertStatus::Acknowledged,
            "resolved" => AlertStatus::Resolved,
            "escalated" => AlertStatus::Escalated,
            "auto_resolved" => AlertStatus::AutoResolved,
            _ => AlertStatus::Open, // fallback
        }
    }

    /// Parse an alert row into a ClinicalAlert struct.
    fn parse_alert_row(row: &sqlx::postgres::PgRow) -> ClinicalAlert {
        ClinicalAlert {
            id: row.get("id"),
            patient_id: row.get("patient_id"),
            organization_id: row.get("organization_id"),
            rule_key: row.get("rule_key"),
            severity: Self::str_to_severity(row.get("severity")),
            status: Self::str_to_status(row.get("status")),
            title: row.get("title"),
            detail: row.get("detail"),
            note: row.get("note"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            acknowledged_at: row.get("acknowledged_at"),
        }
    }
}

#[async_trait]
impl AlertRepository for PgAlertRepository {
    async fn insert(
        &self,
        organization_id: Uuid,
        req: CreateAlertRequest,
    ) -> Result<ClinicalAlert> {
        let id = new_v7();
        let detail = if req.detail.is_null() {
            serde_json::json!({})
        } else {
            req.detail.clone()
        };

        let row = sqlx::query(
            "INSERT INTO clinical_alert (id, patient_id, organization_id, rule_key, severity, status, title, detail)
             VALUES ($1, $2, $3, $4, $5::alert_severity, 'open'::alert_status, $6, $7)
             RETURNING id, patient_id, organization_id, rule_key, severity::text, status::text,
                       title, detail, note, created_at, updated_at, acknowledged_at",
        )
        .bind(id)
        .bind(req.patient_id)
        .bind(organization_id)
        .bind(&req.rule_key)
        .bind(Self::severity_to_str(req.severity))
        .bind(&req.title)
        .bind(&detail)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_alert_row(&row))
    }

    async fn fetch(&self, organization_id: Uuid, id: Uuid) -> Result<ClinicalAlert> {
        let row = sqlx::query(
            "SELECT id, patient_id, organization_id, rule_key, severity::text, status::text,
                    title, detail, note, created_at, updated_at, acknowledged_at
             FROM clinical_alert WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref()
            .map(Self::parse_alert_row)
            .ok_or(Error::AlertNotFound(id))
    }

    async fn list(&self, organization_id: Uuid, query: AlertListQuery) -> Result<AlertPage> {
        let limit = query
            .limit
            .unwrap_or(defaults::PAGE_LIMIT)
            .clamp(1, defaults::PAGE_LIMIT_MAX);
        let offset = query.offset.unwrap_or(defaults::PAGE_OFFSET).max(0);
        let status_str = query.status.map(Self::status_to_str);
        let severity_str = query.severity.map(Self::severity_to_str);

        let rows = sqlx::query(
            "SELECT id, patient_id, organization_id, rule_key, severity::text, status::text,
                    title, detail, note, created_at, updated_at, acknowledged_at
             FROM clinical_alert
             WHERE organization_id = $1
               AND ($2::alert_status IS NULL OR status = $2::alert_status)
               AND ($3::alert_severity IS NULL OR severity = $3::alert_severity)
               AND ($4::uuid IS NULL OR patient_id = $4)
             ORDER BY created_at DESC
             LIMIT $5 OFFSET $6",
        )
        .bind(organization_id)
        .bind(status_str)
        .bind(severity_str)
        .bind(query.patient_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM clinical_alert
             WHERE organization_id = $1
               AND ($2::alert_status IS NULL OR status = $2::alert_status)
               AND ($3::alert_severity IS NULL OR severity = $3::alert_severity)
               AND ($4::uuid IS NULL OR patient_id = $4)",
        )
        .bind(organization_id)
        .bind(status_str)
        .bind(severity_str)
        .bind(query.patient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(AlertPage {
            alerts: rows.iter().map(Self::parse_alert_row).collect(),
            total: total.0,
            limit,
            offset,
        })
    }

    async fn transition(
        &self,
        organization_id: Uuid,
        id: Uuid,
        transition: AlertTransition,
        note: Option<&str>,
    ) -> Result<ClinicalAlert> {
        let target = Self::status_to_str(transition.target());
        let allowed: Vec<String> = transition
            .allowed_from()
            .iter()
            .map(|s| Self::status_to_str(*s).to_string())
            .collect();

        // The status guard rides in the WHERE clause, making the
        // read-modify-write a single atomic statement under concurrency.
        let row = sqlx::query(
            "UPDATE clinical_alert
             SET status = $1::alert_status,
                 note = COALESCE($2, note),
                 acknowledged_at = CASE WHEN $1 = 'acknowledged' THEN now() ELSE acknowledged_at END,
                 updated_at = now()
             WHERE id = $3 AND organization_id = $4
               AND status = ANY($5::alert_status[])
             RETURNING id, patient_id, organization_id, rule_key, severity::text, status::text,
                       title, detail, note, created_at, updated_at, acknowledged_at",
        )
        .bind(target)
        .bind(note)
        .bind(id)
        .bind(organization_id)
        .bind(&allowed)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(row) = row {
            return Ok(Self::parse_alert_row(&row));
        }

        // No row updated: the alert is missing or its current status rejects
        // the transition. Classify so the caller can answer 404 vs 409.
        let current: Option<(String,)> = sqlx::query_as(
            "SELECT status::text FROM clinical_alert WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match current {
            Some((status,)) => Err(Error::Conflict(format!(
                "cannot {} alert {}: status is {}",
                transition, id, status
            ))),
            None => Err(Error::AlertNotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{alert_request, test_pool};
    use vigil_core::is_v7;

    async fn setup() -> PgAlertRepository {
        PgAlertRepository::new(test_pool().await)
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn test_insert_and_fetch() {
        let repo = setup().await;
        let org = Uuid::new_v4();
        let patient = Uuid::new_v4();

        let alert = repo.insert(org, alert_request(patient)).await.unwrap();
        assert!(is_v7(&alert.id));
        assert_eq!(alert.organization_id, org);
        assert_eq!(alert.patient_id, patient);
        assert_eq!(alert.status, AlertStatus::Open);
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.detail["measured"], 87);
        assert!(alert.note.is_none());
        assert!(alert.acknowledged_at.is_none());

        let fetched = repo.fetch(org, alert.id).await.unwrap();
        assert_eq!(fetched.id, alert.id);
        assert_eq!(fetched.rule_key, "spo2_low");
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn test_fetch_scoped_to_organization() {
        let repo = setup().await;
        let org = Uuid::new_v4();
        let other_org = Uuid::new_v4();

        let alert = repo
            .insert(org, alert_request(Uuid::new_v4()))
            .await
            .unwrap();

        let err = repo.fetch(other_org, alert.id).await.unwrap_err();
        assert!(matches!(err, Error::AlertNotFound(id) if id == alert.id));
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn test_list_filters_and_pagination() {
        let repo = setup().await;
        let org = Uuid::new_v4();
        let patient_a = Uuid::new_v4();
        let patient_b = Uuid::new_v4();

        for _ in 0..3 {
            repo.insert(org, alert_request(patient_a)).await.unwrap();
        }
        let mut warn_req = alert_request(patient_b);
        warn_req.severity = AlertSeverity::Warning;
        let b = repo.insert(org, warn_req).await.unwrap();
        repo.transition(org, b.id, AlertTransition::Acknowledge, None)
            .await
            .unwrap();

        // Organization-wide, newest first
        let page = repo.list(org, AlertListQuery::default()).await.unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.alerts.len(), 4);
        for pair in page.alerts.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }

        // Filter by patient
        let page = repo
            .list(
                org,
                AlertListQuery {
                    patient_id: Some(patient_a),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 3);

        // Filter by status
        let page = repo
            .list(
                org,
                AlertListQuery {
                    status: Some(AlertStatus::Acknowledged),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.alerts[0].id, b.id);

        // Filter by severity
        let page = repo
            .list(
                org,
                AlertListQuery {
                    severity: Some(AlertSeverity::Warning),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.alerts[0].id, b.id);

        // Pagination
        let page = repo
            .list(
                org,
                AlertListQuery {
                    limit: Some(2),
                    offset: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.alerts.len(), 2);
        assert_eq!(page.limit, 2);
        assert_eq!(page.offset, 2);
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn test_acknowledge_sets_timestamp_and_note() {
        let repo = setup().await;
        let org = Uuid::new_v4();
        let alert = repo
            .insert(org, alert_request(Uuid::new_v4()))
            .await
            .unwrap();

        let acked = repo
            .transition(org, alert.id, AlertTransition::Acknowledge, Some("on it"))
            .await
            .unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert_eq!(acked.note.as_deref(), Some("on it"));
        assert!(acked.acknowledged_at.is_some());
        assert!(acked.updated_at > alert.updated_at);
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn test_resolve_allowed_from_escalated() {
        let repo = setup().await;
        let org = Uuid::new_v4();
        let alert = repo
            .insert(org, alert_request(Uuid::new_v4()))
            .await
            .unwrap();

        repo.transition(org, alert.id, AlertTransition::Escalate, None)
            .await
            .unwrap();
        let resolved = repo
            .transition(org, alert.id, AlertTransition::Resolve, None)
            .await
            .unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        // Escalate never stamped acknowledged_at
        assert!(resolved.acknowledged_at.is_none());
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn test_double_acknowledge_is_conflict() {
        let repo = setup().await;
        let org = Uuid::new_v4();
        let alert = repo
            .insert(org, alert_request(Uuid::new_v4()))
            .await
            .unwrap();

        repo.transition(org, alert.id, AlertTransition::Acknowledge, None)
            .await
            .unwrap();
        let err = repo
            .transition(org, alert.id, AlertTransition::Acknowledge, None)
            .await
            .unwrap_err();
        match err {
            Error::Conflict(msg) => {
                assert!(msg.contains("acknowledged"));
            }
            other => panic!("Expected Conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn test_terminal_status_names_current_state() {
        let repo = setup().await;
        let org = Uuid::new_v4();
        let alert = repo
            .insert(org, alert_request(Uuid::new_v4()))
            .await
            .unwrap();

        repo.transition(org, alert.id, AlertTransition::Resolve, None)
            .await
            .unwrap();
        let err = repo
            .transition(org, alert.id, AlertTransition::Escalate, None)
            .await
            .unwrap_err();
        match err {
            Error::Conflict(msg) => {
                assert!(msg.contains("resolved"));
            }
            other => panic!("Expected Conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn test_transition_unknown_alert_not_found() {
        let repo = setup().await;
        let missing = Uuid::new_v4();

        let err = repo
            .transition(Uuid::new_v4(), missing, AlertTransition::Resolve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlertNotFound(id) if id == missing));
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn test_auto_resolve_from_acknowledged() {
        let repo = setup().await;
        let org = Uuid::new_v4();
        let alert = repo
            .insert(org, alert_request(Uuid::new_v4()))
            .await
            .unwrap();

        repo.transition(org, alert.id, AlertTransition::Acknowledge, None)
            .await
            .unwrap();
        let closed = repo
            .transition(org, alert.id, AlertTransition::AutoResolve, None)
            .await
            .unwrap();
        assert_eq!(closed.status, AlertStatus::AutoResolved);
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL with migrated database
    async fn test_transition_without_note_keeps_previous() {
        let repo = setup().await;
        let org = Uuid::new_v4();
        let alert = repo
            .insert(org, alert_request(Uuid::new_v4()))
            .await
            .unwrap();

        repo.transition(org, alert.id, AlertTransition::Acknowledge, Some("first"))
            .await
            .unwrap();
        let resolved = repo
            .transition(org, alert.id, AlertTransition::Resolve, None)
            .await
            .unwrap();
        assert_eq!(resolved.note.as_deref(), Some("first"));
    }
}
