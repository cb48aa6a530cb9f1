//! Health check endpoint

use axum::{extract::State, Json};

use crate::api::{error::ApiResult, state::ApiState, types::HealthResponse};

/// GET /api/v1/health
///
/// Liveness plus store health and current agent-pool size
pub async fn health_check(State(state): State<ApiState>) -> ApiResult<Json<HealthResponse>> {
    let store_health = state.store.health_check().await?;

    Ok(Json(HealthResponse {
        status: if store_health.healthy { "ok" } else { "degraded" }.to_string(),
        store_healthy: store_health.healthy,
        agents: state.pool.len().await,
    }))
}
