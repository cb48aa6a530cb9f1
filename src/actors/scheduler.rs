//! Bucket schedulers: periodic tickers driving the monitor workers
//!
//! Five independent tickers, one per permitted cadence (1, 5, 10, 30 and
//! 60 minutes). Each tick selects the bucket's due monitors (matching
//! `frequency`, not paused, `updated_at` older than the bucket window)
//! and fans them out to workers in pages of 100, awaiting each page
//! before fetching the next. Page-at-a-time execution bounds concurrency
//! and gives natural backpressure.
//!
//! ## Double-service protection
//!
//! The window is `W(B) = B - 5 s`: close enough to the cadence to absorb
//! timer jitter, and no larger than the cadence so a monitor serviced by
//! one tick (its `updated_at` bumped) cannot be selected again by the
//! next. A ticker firing while its predecessor still runs is not
//! coalesced; the `updated_at` filter keeps the overlap harmless.
//!
//! Buckets never coordinate: every monitor belongs to exactly one bucket.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::pool::AgentPool;
use crate::probe::ProbeClient;
use crate::storage::UptimeStore;

use super::messages::{SchedulerCommand, TickSummary};
use super::worker::MonitorWorker;

/// The five scheduler buckets, in minutes. Exactly the permitted monitor
/// frequencies.
pub const BUCKET_MINUTES: [u32; 5] = [1, 5, 10, 30, 60];

/// Fan-out page size; at most this many workers run concurrently per
/// bucket.
pub const PAGE_SIZE: usize = 100;

/// How much earlier than the full cadence a monitor becomes due again.
const WINDOW_JITTER_SECS: i64 = 5;

/// Extra wall-clock budget a worker gets beyond the bucket cadence
/// before the scheduler cancels it.
pub const WORKER_GRACE: Duration = Duration::from_secs(2);

/// Due-set window for a bucket: `B - jitter`, slightly less than the
/// cadence itself.
pub fn bucket_window(frequency_minutes: u32) -> chrono::Duration {
    chrono::Duration::minutes(frequency_minutes as i64)
        - chrono::Duration::seconds(WINDOW_JITTER_SECS)
}

/// One bucket's ticker actor.
pub struct BucketScheduler {
    frequency: u32,
    store: Arc<dyn UptimeStore>,
    worker: Arc<MonitorWorker>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
    page_size: usize,
}

impl BucketScheduler {
    pub fn new(
        frequency: u32,
        store: Arc<dyn UptimeStore>,
        worker: Arc<MonitorWorker>,
        command_rx: mpsc::Receiver<SchedulerCommand>,
        page_size: usize,
    ) -> Self {
        Self {
            frequency,
            store,
            worker,
            command_rx,
            page_size,
        }
    }

    /// Run the ticker loop until shutdown. The first sweep fires one
    /// full cadence after startup; `TickNow` covers immediate sweeps.
    #[instrument(skip(self), fields(bucket = self.frequency))]
    pub async fn run(mut self) {
        debug!("starting bucket scheduler");

        let period = Duration::from_secs(self.frequency as u64 * 60);
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = self.tick().await;
                    if summary.scanned > 0 {
                        info!(
                            "bucket {} tick: {} due, {} appended, {} alerted, {} skipped, {} timed out",
                            self.frequency,
                            summary.scanned,
                            summary.appended,
                            summary.alerted,
                            summary.skipped,
                            summary.timed_out,
                        );
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SchedulerCommand::TickNow { respond_to } => {
                            debug!("received TickNow command");
                            let summary = self.tick().await;
                            let _ = respond_to.send(summary);
                        }

                        SchedulerCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("bucket scheduler stopped");
    }

    /// One sweep over the bucket's due monitors.
    async fn tick(&self) -> TickSummary {
        let cutoff = Utc::now() - bucket_window(self.frequency);
        let worker_budget =
            Duration::from_secs(self.frequency as u64 * 60) + WORKER_GRACE;

        let mut summary = TickSummary::default();
        let mut cursor: Option<String> = None;

        loop {
            // Keyset pagination: monitors processed by this sweep bump
            // their updated_at and drop out of the predicate, while
            // skipped ones stay due; the id cursor walks past both.
            let page = match self
                .store
                .due_monitors(self.frequency, cutoff, cursor.as_deref(), self.page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    error!("due-set query failed: {}", e);
                    break;
                }
            };

            if page.is_empty() {
                break;
            }

            let page_len = page.len();
            cursor = page.last().map(|m| m.id.clone());
            summary.scanned += page_len;

            // Whole page in parallel; await it before the next page.
            let results = join_all(page.iter().map(|monitor| {
                let worker = self.worker.clone();
                async move { timeout(worker_budget, worker.run_monitor(monitor)).await }
            }))
            .await;

            for (monitor, result) in page.iter().zip(results) {
                match result {
                    Ok(outcome) => summary.absorb(&outcome),
                    Err(_) => {
                        // Cancelled at an await point: no partially
                        // written candidate is emitted past this line.
                        warn!("worker for monitor {} exceeded its deadline", monitor.id);
                        summary.timed_out += 1;
                    }
                }
            }

            // A short page means the due-set is exhausted.
            if page_len < self.page_size {
                break;
            }
        }

        summary
    }
}

/// Handle for controlling one bucket scheduler
#[derive(Clone)]
pub struct BucketHandle {
    sender: mpsc::Sender<SchedulerCommand>,

    /// The bucket's cadence in minutes
    pub frequency: u32,
}

impl BucketHandle {
    /// Spawn a bucket scheduler as a tokio task and return its handle.
    pub fn spawn(
        frequency: u32,
        store: Arc<dyn UptimeStore>,
        worker: Arc<MonitorWorker>,
        page_size: usize,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let actor = BucketScheduler::new(frequency, store, worker, cmd_rx, page_size);
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            frequency,
        }
    }

    /// Trigger an immediate sweep and wait for its summary.
    pub async fn tick_now(&self) -> anyhow::Result<TickSummary> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::TickNow { respond_to: tx })
            .await?;

        Ok(rx.await?)
    }

    /// Gracefully shut the bucket down.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(SchedulerCommand::Shutdown).await;
    }
}

/// All five bucket schedulers of one control plane.
pub struct SchedulerSet {
    buckets: Vec<BucketHandle>,
}

impl SchedulerSet {
    /// Spawn one scheduler per bucket. Any scheduling state from a
    /// previous process is gone by construction: tickers live only as
    /// tasks owned by this set, nothing is persisted.
    pub fn start(
        store: Arc<dyn UptimeStore>,
        pool: Arc<AgentPool>,
        probe: ProbeClient,
        page_size: usize,
    ) -> Self {
        let worker = Arc::new(MonitorWorker::new(store.clone(), pool, probe));

        let buckets = BUCKET_MINUTES
            .iter()
            .map(|&frequency| {
                let handle =
                    BucketHandle::spawn(frequency, store.clone(), worker.clone(), page_size);
                info!("bucket scheduler started: every {} min", frequency);
                handle
            })
            .collect();

        Self { buckets }
    }

    pub fn bucket(&self, frequency: u32) -> Option<&BucketHandle> {
        self.buckets.iter().find(|b| b.frequency == frequency)
    }

    pub fn handles(&self) -> &[BucketHandle] {
        &self.buckets
    }

    /// Stop every bucket. In-flight pages finish before the actors exit.
    pub async fn stop(&self) {
        for bucket in &self.buckets {
            bucket.shutdown().await;
        }
    }
}
