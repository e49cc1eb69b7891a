//! Cooldown Routes

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::AppState;
use cooldown_limiter::OpKey;
use safety_config::OperationType;

/// Countdown for one (operation type, target) pair
///
/// Computed on query; UI countdowns must re-poll rather than assume a
/// fixed decrement.
#[derive(Debug, Serialize)]
pub struct CooldownResponse {
    pub op_type: OperationType,
    pub target_id: String,
    pub can_execute: bool,
    pub remaining_ms: u64,
}

/// Get the remaining cooldown for a (type, target) key
pub async fn get_cooldown(
    State(state): State<AppState>,
    Path((op_type, target_id)): Path<(OperationType, String)>,
) -> Json<CooldownResponse> {
    let key = OpKey::new(op_type, target_id.clone());
    Json(CooldownResponse {
        op_type,
        target_id,
        can_execute: state.cooldowns.can_execute(&key),
        remaining_ms: state.cooldowns.cooldown_remaining(&key).as_millis() as u64,
    })
}

/// Administrative cooldown reset for a (type, target) key
pub async fn reset_cooldown(
    State(state): State<AppState>,
    Path((op_type, target_id)): Path<(OperationType, String)>,
) -> Json<CooldownResponse> {
    let key = OpKey::new(op_type, target_id.clone());
    state.cooldowns.reset(&key);
    Json(CooldownResponse {
        op_type,
        target_id,
        can_execute: true,
        remaining_ms: 0,
    })
}
