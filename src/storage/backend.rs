//! Store trait definition
//!
//! This module defines the `UptimeStore` trait that both store
//! implementations (SQLite, in-memory) implement.
//!
//! The pipeline relies on a small set of query patterns, each backed by an
//! index in the SQLite schema:
//!
//! - latest event for a monitor: `(monitor_id, timestamp DESC) LIMIT 1`
//! - events in a window, ascending: `(monitor_id, timestamp >= T)`
//! - paged events, descending: `(monitor_id) ORDER BY timestamp DESC`
//! - scheduler due-set: `(frequency, is_paused, updated_at)`
//! - alert queue scan: `(user_id, created_at)`
//!
//! No multi-row transactions are required: appends are single-row inserts,
//! and the `end_time` / `updated_at` / `last_alert_sent_at` mutations are
//! single-row updates. The invariants tolerate a crash between writes (a
//! stale null `end_time` is harmless; aggregators fall back to `now`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::error::StorageResult;
use super::schema::{AgentRow, AlertRow, EventRow, MonitorRow};

/// Health status of the store
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the store operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Trait for the persisted collections the pipeline reads and writes
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`; one store instance is shared by
/// every bucket scheduler, worker, and API handler.
///
/// ## Error Handling
///
/// Methods return `StorageResult<T>`. Callers decide whether a failure
/// skips a tick (reads) or is logged and tolerated (writes); see the
/// worker's error taxonomy.
#[async_trait]
pub trait UptimeStore: Send + Sync {
    // ========================================================================
    // Monitors
    // ========================================================================

    /// Fetch one page of due monitors for a scheduler bucket.
    ///
    /// Selects monitors with the given `frequency`, not paused, whose
    /// `updated_at` is at or before `cutoff`. Keyset pagination: only rows
    /// with id strictly greater than `after_id` are returned, ordered by
    /// id, at most `limit` rows. Passing the last id of the previous page
    /// walks the due-set without re-selecting monitors the current tick
    /// already processed or skipped.
    async fn due_monitors(
        &self,
        frequency: u32,
        cutoff: DateTime<Utc>,
        after_id: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<MonitorRow>>;

    async fn get_monitor(&self, id: &str) -> StorageResult<Option<MonitorRow>>;

    /// Insert a monitor row. Validates the cadence enumerations. This is
    /// the seam the REST collaborator writes through; the pipeline itself
    /// never creates monitors.
    async fn insert_monitor(&self, monitor: &MonitorRow) -> StorageResult<()>;

    async fn monitors_for_user(&self, user_id: &str) -> StorageResult<Vec<MonitorRow>>;

    /// Bump `updated_at`. The value never moves backwards, so a late
    /// worker cannot shrink the window a newer run already established.
    async fn touch_monitor(&self, id: &str, now: DateTime<Utc>) -> StorageResult<()>;

    async fn set_last_alert_sent(&self, id: &str, now: DateTime<Utc>) -> StorageResult<()>;

    /// Pause or resume a monitor (REST seam).
    async fn set_paused(&self, id: &str, paused: bool) -> StorageResult<()>;

    // ========================================================================
    // Uptime events
    // ========================================================================

    /// Latest event for a monitor, if any.
    async fn latest_event(&self, monitor_id: &str) -> StorageResult<Option<EventRow>>;

    /// Append one event. The `id` field of the argument is ignored; the
    /// store assigns one and returns it.
    async fn insert_event(&self, event: &EventRow) -> StorageResult<i64>;

    /// Set `end_time` on a previously appended event. Only takes effect if
    /// `end_time` is still null, so the value is written exactly once.
    async fn close_event(&self, event_id: i64, end_time: DateTime<Utc>) -> StorageResult<()>;

    /// Events for a monitor with `timestamp >= since`, ascending.
    async fn events_since(
        &self,
        monitor_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<EventRow>>;

    /// One page of a monitor's events, newest first. `page` is zero-based.
    async fn events_page(
        &self,
        monitor_id: &str,
        page: usize,
        per_page: usize,
    ) -> StorageResult<Vec<EventRow>>;

    /// The newest event carrying any adverse field, optionally scoped to
    /// one user's monitors.
    async fn latest_adverse_event(&self, user_id: Option<&str>)
        -> StorageResult<Option<EventRow>>;

    // ========================================================================
    // Alerts
    // ========================================================================

    /// Append one alert record; returns the assigned id.
    async fn insert_alert(&self, alert: &AlertRow) -> StorageResult<i64>;

    /// A user's alerts, newest first.
    async fn alerts_for_user(&self, user_id: &str) -> StorageResult<Vec<AlertRow>>;

    // ========================================================================
    // Agents
    // ========================================================================

    /// All registered agents of type `monitorAgents`, in stable id order.
    async fn list_monitor_agents(&self) -> StorageResult<Vec<AgentRow>>;

    /// Register an agent; returns the assigned id.
    async fn insert_agent(&self, agent: &AgentRow) -> StorageResult<i64>;

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Lightweight liveness probe of the store.
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Release connections and flush pending writes.
    async fn close(&self) -> StorageResult<()>;
}
