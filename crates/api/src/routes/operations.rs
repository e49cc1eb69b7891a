//! Operation Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;
use op_authorizer::{Operation, OperationInput};
use safety_config::RiskLevel;

/// Query parameters for the pending-operations endpoint
#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    /// Filter by assessed risk level
    pub risk: Option<RiskLevel>,
}

/// Body for approve/reject, naming the acting human
#[derive(Debug, Default, Deserialize)]
pub struct ActorBody {
    #[serde(default)]
    pub actor: Option<String>,
}

/// Response for list endpoints
#[derive(Debug, Serialize)]
pub struct OperationListResponse {
    pub data: Vec<Operation>,
    pub count: usize,
}

/// Response for retry, distinguishing "no retry possible"
#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub retried: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
}

/// Body for the dry-run assessment endpoint
#[derive(Debug, Deserialize)]
pub struct AssessRequest {
    pub op_type: safety_config::OperationType,
    pub target: safety_config::OperationTarget,
}

/// Dry-run risk preview, for confirmation dialogs
#[derive(Debug, Serialize)]
pub struct AssessResponse {
    pub risk_level: RiskLevel,
    pub requires_confirmation: bool,
    pub cooldown_ms: u64,
    pub max_retries: u32,
}

/// Assess an operation without queueing it
pub async fn assess_operation(
    State(state): State<AppState>,
    Json(req): Json<AssessRequest>,
) -> Json<AssessResponse> {
    let risk = risk_assessor::assess_risk(req.op_type, &req.target, &state.config);
    Json(AssessResponse {
        risk_level: risk,
        requires_confirmation: risk_assessor::requires_confirmation(risk, &state.config),
        cooldown_ms: risk_assessor::cooldown_ms(req.op_type, &state.config),
        max_retries: risk_assessor::max_retries(req.op_type, &state.config),
    })
}

/// Queue a proposed operation
pub async fn queue_operation(
    State(state): State<AppState>,
    Json(input): Json<OperationInput>,
) -> (StatusCode, Json<Operation>) {
    let operation = state.authorizer.queue_operation(input);
    counter!("opsgate_operations_queued_total").increment(1);
    (StatusCode::CREATED, Json(operation))
}

/// List pending operations, optionally filtered by risk level
pub async fn pending_operations(
    State(state): State<AppState>,
    Query(params): Query<PendingQuery>,
) -> Json<OperationListResponse> {
    let data = state.authorizer.pending_operations(params.risk);
    Json(OperationListResponse {
        count: data.len(),
        data,
    })
}

/// Fetch a single operation
pub async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Operation>, ApiError> {
    state
        .authorizer
        .get_operation(id)
        .map(Json)
        .ok_or(ApiError(op_authorizer::AuthorizerError::NotFound { id }))
}

/// Approve a pending operation
pub async fn approve_operation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ActorBody>>,
) -> Result<Json<Operation>, ApiError> {
    let actor = body.and_then(|Json(b)| b.actor);
    let operation = state.authorizer.approve_operation(id, actor.as_deref())?;
    Ok(Json(operation))
}

/// Reject a pending operation
pub async fn reject_operation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ActorBody>>,
) -> Result<Json<Operation>, ApiError> {
    let actor = body.and_then(|Json(b)| b.actor);
    let operation = state.authorizer.reject_operation(id, actor.as_deref())?;
    Ok(Json(operation))
}

/// Execute an approved operation (cooldown-gated)
pub async fn execute_operation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Operation>, ApiError> {
    let operation = state.authorizer.execute_operation(id)?;
    counter!("opsgate_operations_executed_total").increment(1);
    Ok(Json(operation))
}

/// Cancel a pending or approved operation
pub async fn cancel_operation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Operation>, ApiError> {
    let operation = state.authorizer.cancel_operation(id)?;
    Ok(Json(operation))
}

/// Retry a failed operation
///
/// Responds 200 with `retried: false` when the budget is exhausted,
/// an expected condition rather than an error.
pub async fn retry_operation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RetryResponse>, ApiError> {
    let retried = state.authorizer.retry_operation(id)?;
    Ok(Json(RetryResponse {
        retried: retried.is_some(),
        operation: retried,
    }))
}
