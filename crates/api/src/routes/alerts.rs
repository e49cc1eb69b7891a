//! Alert and Correlation-Group Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use alert_correlator::{Alert, AlertInput, CorrelationGroupView, Severity};

/// Query parameters for the alerts endpoint
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// Filter by severity
    pub severity: Option<Severity>,
    /// Maximum number of records
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for the alerts endpoint
#[derive(Debug, Serialize)]
pub struct AlertListResponse {
    pub data: Vec<Alert>,
    pub count: usize,
}

/// Response for the correlation-groups endpoint
#[derive(Debug, Serialize)]
pub struct GroupListResponse {
    pub data: Vec<CorrelationGroupView>,
    pub count: usize,
}

/// Outcome of a bool-returning mutation
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub ok: bool,
}

/// Ingest an alert from a monitoring collaborator
pub async fn add_alert(
    State(state): State<AppState>,
    Json(input): Json<AlertInput>,
) -> (StatusCode, Json<Alert>) {
    let alert = state.correlator.add_alert(input);
    counter!("opsgate_alerts_ingested_total").increment(1);
    (StatusCode::CREATED, Json(alert))
}

/// List unresolved alerts, optionally filtered by severity
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertQuery>,
) -> Json<AlertListResponse> {
    let data: Vec<Alert> = state
        .correlator
        .unresolved_alerts()
        .into_iter()
        .filter(|a| params.severity.map_or(true, |s| a.severity == s))
        .take(params.limit)
        .collect();
    Json(AlertListResponse {
        count: data.len(),
        data,
    })
}

/// Acknowledge one alert
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<MutationResponse>) {
    let ok = state.correlator.acknowledge_alert(id);
    let status = if ok { StatusCode::OK } else { StatusCode::NOT_FOUND };
    (status, Json(MutationResponse { ok }))
}

/// Resolve one alert
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<MutationResponse>) {
    let ok = state.correlator.resolve_alert(id);
    let status = if ok { StatusCode::OK } else { StatusCode::NOT_FOUND };
    (status, Json(MutationResponse { ok }))
}

/// List correlation groups with inferred root causes
pub async fn list_correlation_groups(
    State(state): State<AppState>,
) -> Json<GroupListResponse> {
    let data = state.correlator.correlation_groups();
    Json(GroupListResponse {
        count: data.len(),
        data,
    })
}

/// Resolve every alert in a correlation group
pub async fn resolve_correlation_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<MutationResponse>) {
    let ok = state.correlator.resolve_correlation_group(id);
    let status = if ok { StatusCode::OK } else { StatusCode::NOT_FOUND };
    (status, Json(MutationResponse { ok }))
}
