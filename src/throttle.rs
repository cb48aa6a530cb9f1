//! Alert throttling
//!
//! Two alerts for the same monitor must be separated by at least
//! `alert_frequency` minutes. The decision is pure; the worker performs
//! the alert insert and the `last_alert_sent_at` update, and the monitor
//! update runs even if the insert fails so a duplicate next tick is still
//! throttled.

use chrono::{DateTime, Duration, Utc};

/// Whether an alert may be emitted now for a monitor in adverse state.
pub fn should_alert(
    last_alert_sent_at: Option<DateTime<Utc>>,
    alert_frequency_minutes: u32,
    now: DateTime<Utc>,
) -> bool {
    match last_alert_sent_at {
        None => true,
        Some(last) => now - last >= Duration::minutes(alert_frequency_minutes as i64),
    }
}
