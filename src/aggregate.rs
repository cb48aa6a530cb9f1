//! Read aggregators over the event log
//!
//! Read-only queries for dashboards and the API: per-user status counts,
//! rolling uptime percentage, latest downtime, and paged history. None of
//! this sits on the tick path; it only ever reads the store.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::storage::{EventRow, StorageResult, UptimeStore};

/// Page size for event history
pub const HISTORY_PAGE_SIZE: usize = 10;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Per-user monitor status counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitoringStats {
    pub up: usize,
    pub down: usize,
    pub paused: usize,
}

/// The most recent observed downtime
#[derive(Debug, Clone, Serialize)]
pub struct DowntimeInfo {
    pub monitor_id: String,
    pub started_at: DateTime<Utc>,
    /// `end_time - timestamp` when the interval is closed, else
    /// `now - timestamp`.
    pub duration_ms: i64,
    pub reason: Option<String>,
}

/// Classify every monitor of a user as up, down or paused.
///
/// The latest event decides; a monitor with no events yet (and not
/// paused) counts as down.
pub async fn monitoring_stats(
    store: &dyn UptimeStore,
    user_id: &str,
) -> StorageResult<MonitoringStats> {
    let monitors = store.monitors_for_user(user_id).await?;

    let mut stats = MonitoringStats::default();
    for monitor in monitors {
        if monitor.is_paused {
            stats.paused += 1;
            continue;
        }

        match store.latest_event(&monitor.id).await? {
            Some(event) if !event.is_adverse() => stats.up += 1,
            _ => stats.down += 1,
        }
    }

    Ok(stats)
}

/// Rolling uptime percentage over the last `days` days.
///
/// Walks the window's events in order, crediting the interval that
/// precedes each event to that event's own authoritative state, and the
/// tail interval to the final event. An empty window is 100%. The result
/// is clamped to [0, 100] and rounded to two decimals.
pub async fn rolling_uptime(
    store: &dyn UptimeStore,
    monitor_id: &str,
    days: i64,
    now: DateTime<Utc>,
) -> StorageResult<f64> {
    let window_start = now - Duration::days(days);
    let events = store.events_since(monitor_id, window_start).await?;

    Ok(uptime_from_events(&events, window_start, now, days))
}

/// The walk itself, over an ascending event slice.
pub fn uptime_from_events(
    events: &[EventRow],
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
    days: i64,
) -> f64 {
    if events.is_empty() {
        return 100.0;
    }

    let mut up_ms = 0i64;
    let mut cursor = window_start;

    for event in events {
        if !event.is_adverse() {
            up_ms += (event.timestamp - cursor).num_milliseconds();
        }
        cursor = event.timestamp;
    }

    if let Some(last) = events.last() {
        if !last.is_adverse() {
            up_ms += (now - cursor).num_milliseconds();
        }
    }

    let window_ms = days * MILLIS_PER_DAY;
    let percent = up_ms as f64 / window_ms as f64 * 100.0;

    (percent.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

/// The most recent event with any adverse field, optionally scoped to one
/// user's monitors.
pub async fn latest_downtime(
    store: &dyn UptimeStore,
    user_id: Option<&str>,
    now: DateTime<Utc>,
) -> StorageResult<Option<DowntimeInfo>> {
    let Some(event) = store.latest_adverse_event(user_id).await? else {
        return Ok(None);
    };

    let end = event.end_time.unwrap_or(now);

    Ok(Some(DowntimeInfo {
        monitor_id: event.monitor_id,
        started_at: event.timestamp,
        duration_ms: (end - event.timestamp).num_milliseconds(),
        reason: event.reason,
    }))
}

/// One page of a monitor's events, newest first.
pub async fn event_history(
    store: &dyn UptimeStore,
    monitor_id: &str,
    page: usize,
) -> StorageResult<Vec<EventRow>> {
    store
        .events_page(monitor_id, page, HISTORY_PAGE_SIZE)
        .await
}
