//! MonitorWorker: executes one probe sequence for one monitor
//!
//! ## Sequence
//!
//! ```text
//! latest event → next() agent → probe ──error──▶ other() agent → probe
//!      │                          │                                │
//!      │                          └──── adverse? verify via other()┘
//!      ▼                                         │
//! should_append? ──yes──▶ close previous + append event
//!      │
//!      ▼
//! adverse? ──yes──▶ throttle → alert insert + last_alert_sent_at
//!      │
//!      ▼
//! touch updated_at (unconditional once a result exists)
//! ```
//!
//! ## Failure semantics
//!
//! Nothing here is fatal at the monitor level. Both-agents-failed, an
//! empty pool, or a failed latest-event read skip the monitor without
//! touching `updated_at`, so the next tick retries it. Persistence-write
//! failures are logged and the `updated_at` bump still runs, so the
//! monitor does not get stuck repeating the same failed write every tick.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, trace, warn};

use crate::pool::AgentPool;
use crate::probe::{ProbeClient, ProbeOutcome};
use crate::storage::{AlertRow, EventRow, MonitorRow, UptimeStore};
use crate::{throttle, transitions};

use super::messages::{SkipReason, WorkerOutcome};

/// Executes the per-monitor probe sequence. One instance is shared by all
/// bucket schedulers; it holds no per-monitor state.
pub struct MonitorWorker {
    store: Arc<dyn UptimeStore>,
    pool: Arc<AgentPool>,
    probe: ProbeClient,
}

impl MonitorWorker {
    pub fn new(store: Arc<dyn UptimeStore>, pool: Arc<AgentPool>, probe: ProbeClient) -> Self {
        Self { store, pool, probe }
    }

    /// Run the full sequence for one monitor. At most one concurrent run
    /// per monitor is guaranteed by the scheduler's due-set predicate.
    #[instrument(skip(self, monitor), fields(monitor = %monitor.id, kind = %monitor.kind))]
    pub async fn run_monitor(&self, monitor: &MonitorRow) -> WorkerOutcome {
        // Latest prior event. Failing open to "no prior event" would
        // insert a spurious first event on every tick, so a read failure
        // skips the monitor instead.
        let last = match self.store.latest_event(&monitor.id).await {
            Ok(last) => last,
            Err(e) => {
                warn!("latest event read failed: {}", e);
                return WorkerOutcome::Skipped(SkipReason::LatestEventUnavailable);
            }
        };

        let Ok(primary) = self.pool.next().await else {
            debug!("agent pool empty, skipping monitor this tick");
            return WorkerOutcome::Skipped(SkipReason::NoAgents);
        };

        // Primary probe, with at most one alternate on a hard error.
        let (mut outcome, mut confirmed_by) = match self.probe.probe(&primary, monitor).await {
            Ok(outcome) => (outcome, primary),
            Err(e) => {
                debug!("primary probe failed: {}", e);

                let Some(alternate) = self.pool.other(&primary).await else {
                    return WorkerOutcome::Skipped(SkipReason::BothAgentsFailed);
                };

                match self.probe.probe(&alternate, monitor).await {
                    Ok(outcome) => (outcome, alternate),
                    Err(e) => {
                        warn!("alternate probe failed too: {}", e);
                        return WorkerOutcome::Skipped(SkipReason::BothAgentsFailed);
                    }
                }
            }
        };

        // Failure verification: an adverse authoritative result gets a
        // second opinion from a different agent. The verifier overwrites
        // availability only; a verifier error leaves the candidate as-is.
        if transitions::is_adverse(monitor.kind, &outcome) {
            if let Some(verifier) = self.pool.other(&confirmed_by).await {
                match self.probe.probe(&verifier, monitor).await {
                    Ok(verdict) => {
                        trace!(
                            "verification via {}: availability {:?} -> {:?}",
                            verifier,
                            outcome.availability,
                            verdict.availability
                        );
                        outcome.availability = verdict.availability;
                        confirmed_by = verifier;
                    }
                    Err(e) => {
                        debug!("verifier probe failed, candidate stands: {}", e);
                    }
                }
            }
        }

        let now = Utc::now();

        let mut appended = false;
        if transitions::should_append(monitor.kind, &outcome, last.as_ref()) {
            // Previous event is closed first; the new event is written
            // last, with its timestamp as the previous end_time.
            if let Some(previous) = &last {
                if let Err(e) = self.store.close_event(previous.id, now).await {
                    warn!("failed to close previous event {}: {}", previous.id, e);
                }
            }

            let candidate = Self::build_event(monitor, &outcome, confirmed_by.clone(), now);
            match self.store.insert_event(&candidate).await {
                Ok(id) => {
                    debug!("appended transition event {}", id);
                    appended = true;
                }
                Err(e) => {
                    warn!("event append failed: {}", e);
                }
            }
        }

        let mut alerted = false;
        if transitions::is_adverse(monitor.kind, &outcome) {
            alerted = self.maybe_alert(monitor, now).await;
        }

        // Unconditional once a probe result exists: this is what keeps the
        // monitor out of the next due-set until its cadence elapses.
        if let Err(e) = self.store.touch_monitor(&monitor.id, now).await {
            warn!("failed to bump updated_at: {}", e);
        }

        WorkerOutcome::Completed { appended, alerted }
    }

    fn build_event(
        monitor: &MonitorRow,
        outcome: &ProbeOutcome,
        confirmed_by: String,
        now: chrono::DateTime<Utc>,
    ) -> EventRow {
        EventRow {
            id: 0,
            monitor_id: monitor.id.clone(),
            user_id: monitor.user_id.clone(),
            timestamp: now,
            end_time: None,
            kind: monitor.kind,
            availability: outcome.availability,
            ping: outcome.ping,
            port_state: outcome.port_state,
            response_time_ms: outcome.response_time_ms,
            confirmed_by_agent: confirmed_by,
            reason: outcome.reason.clone(),
        }
    }

    /// Throttled alert emission. Returns whether an alert was enqueued.
    async fn maybe_alert(&self, monitor: &MonitorRow, now: chrono::DateTime<Utc>) -> bool {
        let Some(user_id) = &monitor.user_id else {
            trace!("monitor has no owning user, skipping alert");
            return false;
        };

        if !throttle::should_alert(monitor.last_alert_sent_at, monitor.alert_frequency, now) {
            trace!("alert throttled");
            return false;
        }

        let alert = AlertRow::new(
            user_id.clone(),
            monitor.id.clone(),
            monitor.url.clone(),
            now,
        );

        let inserted = match self.store.insert_alert(&alert).await {
            Ok(id) => {
                debug!("enqueued alert {} for {}", id, monitor.display());
                true
            }
            Err(e) => {
                warn!("alert insert failed: {}", e);
                false
            }
        };

        // The monitor update runs even when the insert failed, so a
        // duplicate alert next tick is still throttled.
        if let Err(e) = self.store.set_last_alert_sent(&monitor.id, now).await {
            warn!("failed to update last_alert_sent_at: {}", e);
        }

        inserted
    }
}
