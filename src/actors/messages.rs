//! Message types for the pipeline actors

use tokio::sync::oneshot;

/// Commands accepted by a bucket scheduler
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Run a sweep immediately, bypassing the interval timer.
    ///
    /// Used by tests and manual refresh operations.
    TickNow {
        /// Channel the tick summary is sent back on
        respond_to: oneshot::Sender<TickSummary>,
    },

    /// Gracefully shut down the scheduler. The in-flight page (if any)
    /// finishes first.
    Shutdown,
}

/// Counters for one scheduler sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Due monitors handed to workers
    pub scanned: usize,

    /// Workers that appended a transition event
    pub appended: usize,

    /// Workers that emitted an alert
    pub alerted: usize,

    /// Workers skipped (no agents, both probes failed, read failure)
    pub skipped: usize,

    /// Workers cancelled by the per-monitor deadline
    pub timed_out: usize,
}

impl TickSummary {
    pub fn absorb(&mut self, outcome: &WorkerOutcome) {
        match outcome {
            WorkerOutcome::Completed { appended, alerted } => {
                if *appended {
                    self.appended += 1;
                }
                if *alerted {
                    self.alerted += 1;
                }
            }
            WorkerOutcome::Skipped(_) => {
                self.skipped += 1;
            }
        }
    }
}

/// Result of one monitor worker run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The probe sequence ran to completion; `updated_at` was bumped.
    Completed {
        /// A state transition was detected and persisted
        appended: bool,
        /// An alert record was enqueued
        alerted: bool,
    },

    /// The monitor was skipped this tick; `updated_at` was left untouched
    /// so the next tick retries it.
    Skipped(SkipReason),
}

/// Why a worker gave up on a monitor for the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The agent pool is empty
    NoAgents,

    /// Primary and alternate probes both failed
    BothAgentsFailed,

    /// The latest-event read failed. Failing open to "no prior event"
    /// would insert a spurious first event every tick, so the monitor is
    /// skipped instead.
    LatestEventUnavailable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoAgents => write!(f, "no monitor agents registered"),
            SkipReason::BothAgentsFailed => write!(f, "primary and alternate probes failed"),
            SkipReason::LatestEventUnavailable => write!(f, "latest event read failed"),
        }
    }
}
