//! Alert and correlation-group records

use crate::root_cause::RootCause;
use chrono::{DateTime, Utc};
use safety_config::TargetType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert severity
///
/// Total order: `Info < Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Kind of condition an alert reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    NetworkIssue,
    DnsIssue,
    VmUnreachable,
    ServiceDegraded,
    ServiceDown,
    ResourceExhaustion,
    HealthCheckFailed,
}

/// Where an alert came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSource {
    /// Source class
    #[serde(rename = "type")]
    pub source_type: TargetType,
    /// Stable identifier (e.g. "vm-3")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Host this source runs on, when known (e.g. a container's VM)
    #[serde(default)]
    pub host: Option<String>,
}

/// Caller-supplied alert, before ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertInput {
    pub source: AlertSource,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
}

/// An ingested health alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub source: AlertSource,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Group this alert belongs to, if correlated
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
    pub resolved: bool,
    /// Set iff `resolved` is true
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Other members of the same group at ingestion time
    #[serde(default)]
    pub related_alert_ids: Vec<Uuid>,
}

/// A cluster of alerts believed to share a common underlying cause
///
/// Derived state: membership is the set of alerts carrying this group's
/// id, and the root cause is recomputed whenever membership changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationGroup {
    pub id: Uuid,
    pub alert_ids: Vec<Uuid>,
    #[serde(default)]
    pub root_cause: Option<RootCause>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Query view of a group with member alerts materialized
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationGroupView {
    pub id: Uuid,
    pub alerts: Vec<Alert>,
    pub root_cause: Option<RootCause>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
