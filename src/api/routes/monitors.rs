//! Per-monitor read endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::aggregate;
use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{EventsResponse, UptimeResponse},
};

/// Default lookback for uptime queries, in days
const DEFAULT_UPTIME_DAYS: i64 = 1;

#[derive(Debug, Deserialize)]
pub struct UptimeQuery {
    days: Option<i64>,
}

/// GET /api/v1/monitors/:id/uptime?days=
///
/// Rolling uptime percentage over the last `days` days
pub async fn get_uptime(
    State(state): State<ApiState>,
    Path(monitor_id): Path<String>,
    Query(query): Query<UptimeQuery>,
) -> ApiResult<Json<UptimeResponse>> {
    let days = query.days.unwrap_or(DEFAULT_UPTIME_DAYS);
    if days <= 0 {
        return Err(ApiError::InvalidRequest(
            "days must be a positive integer".to_string(),
        ));
    }

    if state.store.get_monitor(&monitor_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("monitor {}", monitor_id)));
    }

    let uptime_percent =
        aggregate::rolling_uptime(state.store.as_ref(), &monitor_id, days, Utc::now()).await?;

    Ok(Json(UptimeResponse {
        monitor_id,
        days,
        uptime_percent,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    page: Option<usize>,
}

/// GET /api/v1/monitors/:id/events?page=
///
/// Paged event history, newest first
pub async fn get_events(
    State(state): State<ApiState>,
    Path(monitor_id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<EventsResponse>> {
    let page = query.page.unwrap_or(0);

    let events = aggregate::event_history(state.store.as_ref(), &monitor_id, page).await?;

    Ok(Json(EventsResponse {
        monitor_id,
        page,
        count: events.len(),
        events,
    }))
}
