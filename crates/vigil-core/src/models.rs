//! Core data models for vigil.
//!
//! These types are shared across all vigil crates and represent
//! the core domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// ALERT TYPES
// =============================================================================

/// Clinical urgency of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational, no action expected
    Info,
    /// Needs review during normal workflow
    Warning,
    /// Needs immediate clinical attention
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid alert severity: {}", s)),
        }
    }
}

/// Lifecycle state of a clinical alert.
///
/// `Resolved` and `AutoResolved` are terminal; no further transitions
/// are accepted once an alert reaches either of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Newly raised, awaiting operator action
    #[default]
    Open,
    /// An operator has seen the alert and taken ownership
    Acknowledged,
    /// Closed by an operator
    Resolved,
    /// Raised to a higher care tier; still accepts resolution
    Escalated,
    /// Closed by the monitoring system without operator action
    AutoResolved,
}

impl AlertStatus {
    /// Whether this status accepts no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::AutoResolved)
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Acknowledged => write!(f, "acknowledged"),
            Self::Resolved => write!(f, "resolved"),
            Self::Escalated => write!(f, "escalated"),
            Self::AutoResolved => write!(f, "auto_resolved"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "acknowledged" => Ok(Self::Acknowledged),
            "resolved" => Ok(Self::Resolved),
            "escalated" => Ok(Self::Escalated),
            "auto_resolved" => Ok(Self::AutoResolved),
            _ => Err(format!("Invalid alert status: {}", s)),
        }
    }
}

// =============================================================================
// TRANSITION TYPES
// =============================================================================

/// An operator- or system-initiated change of alert status.
///
/// Each transition carries its own guard: the set of statuses it may be
/// applied from. Applying a transition from any other status is a
/// conflict, never a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTransition {
    /// Operator takes ownership of an open alert
    Acknowledge,
    /// Operator closes the alert
    Resolve,
    /// Operator raises the alert to a higher care tier
    Escalate,
    /// Monitoring system closes the alert (e.g. the vital normalized)
    AutoResolve,
}

impl AlertTransition {
    /// Status the alert ends up in after this transition.
    pub fn target(&self) -> AlertStatus {
        match self {
            Self::Acknowledge => AlertStatus::Acknowledged,
            Self::Resolve => AlertStatus::Resolved,
            Self::Escalate => AlertStatus::Escalated,
            Self::AutoResolve => AlertStatus::AutoResolved,
        }
    }

    /// Statuses this transition may be applied from.
    pub fn allowed_from(&self) -> &'static [AlertStatus] {
        match self {
            Self::Acknowledge => &[AlertStatus::Open],
            Self::Resolve => &[
                AlertStatus::Open,
                AlertStatus::Acknowledged,
                AlertStatus::Escalated,
            ],
            Self::Escalate => &[AlertStatus::Open, AlertStatus::Acknowledged],
            Self::AutoResolve => &[AlertStatus::Open, AlertStatus::Acknowledged],
        }
    }

    /// Whether this transition is valid from the given status.
    pub fn is_allowed_from(&self, status: AlertStatus) -> bool {
        self.allowed_from().contains(&status)
    }
}

impl std::fmt::Display for AlertTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Acknowledge => write!(f, "acknowledge"),
            Self::Resolve => write!(f, "resolve"),
            Self::Escalate => write!(f, "escalate"),
            Self::AutoResolve => write!(f, "auto_resolve"),
        }
    }
}

/// A clinical alert raised for a patient within an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalAlert {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub organization_id: Uuid,
    /// Identifier of the monitoring rule that raised the alert (e.g. "spo2_low")
    pub rule_key: String,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub title: String,
    /// Structured rule payload (thresholds, measured values)
    pub detail: JsonValue,
    /// Free-text note attached by the operator on a transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

// =============================================================================
// OPERATOR TYPES
// =============================================================================

/// Role attached to an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorRole {
    /// Clinical staff handling alerts
    Clinician,
    /// Organization administrator
    Admin,
    /// Patient-facing token; never treated as an operator
    Patient,
}

impl OperatorRole {
    /// Whether this role may act on and subscribe to the alert surface.
    pub fn is_operator(&self) -> bool {
        matches!(self, Self::Clinician | Self::Admin)
    }
}

impl std::fmt::Display for OperatorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clinician => write!(f, "clinician"),
            Self::Admin => write!(f, "admin"),
            Self::Patient => write!(f, "patient"),
        }
    }
}

impl std::str::FromStr for OperatorRole {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clinician" => Ok(Self::Clinician),
            "admin" => Ok(Self::Admin),
            "patient" => Ok(Self::Patient),
            _ => Err(format!("Invalid operator role: {}", s)),
        }
    }
}

/// Authenticated identity resolved from an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub operator_id: Uuid,
    pub organization_id: Uuid,
    pub role: OperatorRole,
}

// =============================================================================
// PATIENT TYPES
// =============================================================================

/// Coarse patient condition broadcast to subscribed operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    /// Vitals within expected ranges
    Stable,
    /// Under closer monitoring
    Observation,
    /// Requires immediate attention
    Critical,
    /// No longer monitored
    Discharged,
}

impl std::fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Observation => write!(f, "observation"),
            Self::Critical => write!(f, "critical"),
            Self::Discharged => write!(f, "discharged"),
        }
    }
}

impl std::str::FromStr for PatientStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "observation" => Ok(Self::Observation),
            "critical" => Ok(Self::Critical),
            "discharged" => Ok(Self::Discharged),
            _ => Err(format!("Invalid patient status: {}", s)),
        }
    }
}

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

fn default_detail() -> JsonValue {
    serde_json::json!({})
}

/// Request body for raising a new alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAlertRequest {
    pub patient_id: Uuid,
    pub rule_key: String,
    pub severity: AlertSeverity,
    pub title: String,
    #[serde(default = "default_detail")]
    pub detail: JsonValue,
}

/// Query filters for listing alerts within an organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertListQuery {
    pub status: Option<AlertStatus>,
    pub severity: Option<AlertSeverity>,
    pub patient_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// One page of alerts plus the total count for the filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPage {
    pub alerts: Vec<ClinicalAlert>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Request body for alert transitions (acknowledge/resolve/escalate).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionAlertRequest {
    /// Optional free-text note recorded on the alert
    pub note: Option<String>,
}

/// Request body for recording a patient status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePatientStatusRequest {
    pub status: PatientStatus,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_alert_status_default() {
        assert_eq!(AlertStatus::default(), AlertStatus::Open);
    }

    #[test]
    fn test_alert_status_terminal() {
        assert!(AlertStatus::Resolved.is_terminal());
        assert!(AlertStatus::AutoResolved.is_terminal());
        assert!(!AlertStatus::Open.is_terminal());
        assert!(!AlertStatus::Acknowledged.is_terminal());
        assert!(!AlertStatus::Escalated.is_terminal());
    }

    #[test]
    fn test_alert_status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&AlertStatus::AutoResolved).unwrap(),
            "\"auto_resolved\""
        );
        let parsed: AlertStatus = serde_json::from_str("\"acknowledged\"").unwrap();
        assert_eq!(parsed, AlertStatus::Acknowledged);
    }

    #[test]
    fn test_alert_status_display_round_trip() {
        for status in [
            AlertStatus::Open,
            AlertStatus::Acknowledged,
            AlertStatus::Resolved,
            AlertStatus::Escalated,
            AlertStatus::AutoResolved,
        ] {
            let parsed = AlertStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_alert_severity_display_round_trip() {
        for severity in [
            AlertSeverity::Info,
            AlertSeverity::Warning,
            AlertSeverity::Critical,
        ] {
            let parsed = AlertSeverity::from_str(&severity.to_string()).unwrap();
            assert_eq!(parsed, severity);
        }
    }

    #[test]
    fn test_acknowledge_only_from_open() {
        assert!(AlertTransition::Acknowledge.is_allowed_from(AlertStatus::Open));
        assert!(!AlertTransition::Acknowledge.is_allowed_from(AlertStatus::Acknowledged));
        assert!(!AlertTransition::Acknowledge.is_allowed_from(AlertStatus::Resolved));
        assert!(!AlertTransition::Acknowledge.is_allowed_from(AlertStatus::Escalated));
        assert!(!AlertTransition::Acknowledge.is_allowed_from(AlertStatus::AutoResolved));
    }

    #[test]
    fn test_resolve_from_open_acknowledged_escalated() {
        assert!(AlertTransition::Resolve.is_allowed_from(AlertStatus::Open));
        assert!(AlertTransition::Resolve.is_allowed_from(AlertStatus::Acknowledged));
        assert!(AlertTransition::Resolve.is_allowed_from(AlertStatus::Escalated));
        assert!(!AlertTransition::Resolve.is_allowed_from(AlertStatus::Resolved));
        assert!(!AlertTransition::Resolve.is_allowed_from(AlertStatus::AutoResolved));
    }

    #[test]
    fn test_escalate_from_open_and_acknowledged() {
        assert!(AlertTransition::Escalate.is_allowed_from(AlertStatus::Open));
        assert!(AlertTransition::Escalate.is_allowed_from(AlertStatus::Acknowledged));
        assert!(!AlertTransition::Escalate.is_allowed_from(AlertStatus::Escalated));
        assert!(!AlertTransition::Escalate.is_allowed_from(AlertStatus::Resolved));
        assert!(!AlertTransition::Escalate.is_allowed_from(AlertStatus::AutoResolved));
    }

    #[test]
    fn test_auto_resolve_from_open_and_acknowledged() {
        assert!(AlertTransition::AutoResolve.is_allowed_from(AlertStatus::Open));
        assert!(AlertTransition::AutoResolve.is_allowed_from(AlertStatus::Acknowledged));
        assert!(!AlertTransition::AutoResolve.is_allowed_from(AlertStatus::Escalated));
        assert!(!AlertTransition::AutoResolve.is_allowed_from(AlertStatus::Resolved));
        assert!(!AlertTransition::AutoResolve.is_allowed_from(AlertStatus::AutoResolved));
    }

    #[test]
    fn test_terminal_statuses_accept_no_transition() {
        for transition in [
            AlertTransition::Acknowledge,
            AlertTransition::Resolve,
            AlertTransition::Escalate,
            AlertTransition::AutoResolve,
        ] {
            assert!(!transition.is_allowed_from(AlertStatus::Resolved));
            assert!(!transition.is_allowed_from(AlertStatus::AutoResolved));
        }
    }

    #[test]
    fn test_transition_targets() {
        assert_eq!(
            AlertTransition::Acknowledge.target(),
            AlertStatus::Acknowledged
        );
        assert_eq!(AlertTransition::Resolve.target(), AlertStatus::Resolved);
        assert_eq!(AlertTransition::Escalate.target(), AlertStatus::Escalated);
        assert_eq!(
            AlertTransition::AutoResolve.target(),
            AlertStatus::AutoResolved
        );
    }

    #[test]
    fn test_transition_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&AlertTransition::AutoResolve).unwrap(),
            "\"auto_resolve\""
        );
    }

    #[test]
    fn test_operator_role_round_trip() {
        for role in [
            OperatorRole::Clinician,
            OperatorRole::Admin,
            OperatorRole::Patient,
        ] {
            let parsed = OperatorRole::from_str(&role.to_string()).unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn test_patient_role_is_not_operator() {
        assert!(OperatorRole::Clinician.is_operator());
        assert!(OperatorRole::Admin.is_operator());
        assert!(!OperatorRole::Patient.is_operator());
    }

    #[test]
    fn test_patient_status_round_trip() {
        for status in [
            PatientStatus::Stable,
            PatientStatus::Observation,
            PatientStatus::Critical,
            PatientStatus::Discharged,
        ] {
            let parsed = PatientStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_invalid_status_string_rejected() {
        assert!(AlertStatus::from_str("closed").is_err());
        assert!(AlertSeverity::from_str("fatal").is_err());
        assert!(OperatorRole::from_str("nurse").is_err());
    }

    #[test]
    fn test_clinical_alert_serialization() {
        let alert = ClinicalAlert {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            rule_key: "spo2_low".to_string(),
            severity: AlertSeverity::Critical,
            status: AlertStatus::Open,
            title: "SpO2 below 90%".to_string(),
            detail: json!({"threshold": 90, "measured": 87}),
            note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            acknowledged_at: None,
        };

        let serialized = serde_json::to_string(&alert).unwrap();
        let deserialized: ClinicalAlert = serde_json::from_str(&serialized).unwrap();
        assert_eq!(alert.id, deserialized.id);
        assert_eq!(deserialized.status, AlertStatus::Open);
    }

    #[test]
    fn test_note_skipped_when_none() {
        let alert = ClinicalAlert {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            rule_key: "hr_high".to_string(),
            severity: AlertSeverity::Warning,
            status: AlertStatus::Open,
            title: "Heart rate elevated".to_string(),
            detail: json!({}),
            note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            acknowledged_at: None,
        };

        let json_value = serde_json::to_value(&alert).unwrap();
        // note should be skipped when None
        assert!(!json_value.as_object().unwrap().contains_key("note"));
    }

    #[test]
    fn test_create_alert_request_default_detail() {
        let body = r#"{
            "patient_id": "00000000-0000-0000-0000-000000000001",
            "rule_key": "bp_high",
            "severity": "warning",
            "title": "Blood pressure elevated"
        }"#;
        let req: CreateAlertRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.detail, json!({}));
    }

    #[test]
    fn test_transition_request_note_optional() {
        let req: TransitionAlertRequest = serde_json::from_str("{}").unwrap();
        assert!(req.note.is_none());

        let req: TransitionAlertRequest =
            serde_json::from_str(r#"{"note": "patient seen"}"#).unwrap();
        assert_eq!(req.note.as_deref(), Some("patient seen"));
    }
}
