//! Aggregate Stats Route

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use alert_correlator::CorrelatorStats;
use cooldown_limiter::CooldownStats;
use op_authorizer::AuthorizerStats;

/// Engine-wide diagnostics, recomputed on demand
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub operations: AuthorizerStats,
    pub cooldowns: CooldownStats,
    pub alerts: CorrelatorStats,
}

/// Get aggregate stats across all three engine components
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        operations: state.authorizer.stats(),
        cooldowns: state.cooldowns.stats(),
        alerts: state.correlator.stats(),
    })
}
