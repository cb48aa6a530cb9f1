//! Monitoring statistics and latest-downtime endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::aggregate;
use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{DowntimeResponse, StatsResponse},
};

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    user_id: String,
}

/// GET /api/v1/stats?user_id=
///
/// Up/down/paused counts over a user's monitors
pub async fn get_stats(
    State(state): State<ApiState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<StatsResponse>> {
    let stats = aggregate::monitoring_stats(state.store.as_ref(), &query.user_id).await?;

    Ok(Json(StatsResponse {
        user_id: query.user_id,
        stats,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DowntimeQuery {
    user_id: Option<String>,
}

/// GET /api/v1/downtime/latest?user_id=
///
/// The most recent adverse interval, optionally scoped to a user
pub async fn latest_downtime(
    State(state): State<ApiState>,
    Query(query): Query<DowntimeQuery>,
) -> ApiResult<Json<DowntimeResponse>> {
    let downtime =
        aggregate::latest_downtime(state.store.as_ref(), query.user_id.as_deref(), Utc::now())
            .await?;

    Ok(Json(DowntimeResponse { downtime }))
}
