//! API response types

use serde::Serialize;

use crate::aggregate::{DowntimeInfo, MonitoringStats};
use crate::storage::EventRow;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_healthy: bool,
    pub agents: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub user_id: String,
    #[serde(flatten)]
    pub stats: MonitoringStats,
}

#[derive(Debug, Serialize)]
pub struct UptimeResponse {
    pub monitor_id: String,
    pub days: i64,
    pub uptime_percent: f64,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub monitor_id: String,
    pub page: usize,
    pub count: usize,
    pub events: Vec<EventRow>,
}

#[derive(Debug, Serialize)]
pub struct DowntimeResponse {
    pub downtime: Option<DowntimeInfo>,
}
