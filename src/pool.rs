//! Agent pool: round-robin selection over registered monitor agents
//!
//! The pool holds the current list of dispatchable agent URLs (type
//! `monitorAgents`). Selection state is one process-wide atomic cursor:
//! every `next()` advances it, so successive calls from any worker
//! interleave fairly with no lost increments.
//!
//! The list is refreshed from the store by a background task at a
//! deliberately slow cadence; registration changes converge well within a
//! day. A refresh failure keeps the previous list.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, instrument, warn};

use crate::storage::UptimeStore;

/// The pool has no registered agents; the current monitor is skipped for
/// this tick without touching `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoAgents;

impl fmt::Display for NoAgents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no monitor agents registered")
    }
}

impl std::error::Error for NoAgents {}

/// Rotating pool of monitor-agent URLs.
pub struct AgentPool {
    agents: RwLock<Vec<String>>,
    cursor: AtomicUsize,
}

impl AgentPool {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            agents: RwLock::new(urls),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Next agent in round-robin order. The cursor is shared across all
    /// workers; `fetch_add` makes the rotation free of lost increments.
    pub async fn next(&self) -> Result<String, NoAgents> {
        let agents = self.agents.read().await;
        if agents.is_empty() {
            return Err(NoAgents);
        }

        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % agents.len();
        Ok(agents[index].clone())
    }

    /// Any agent other than `except`: the first non-matching entry in
    /// stable order. Callers do not depend on which one.
    pub async fn other(&self, except: &str) -> Option<String> {
        let agents = self.agents.read().await;
        agents.iter().find(|url| url.as_str() != except).cloned()
    }

    /// Swap in a freshly loaded agent list.
    pub async fn replace(&self, urls: Vec<String>) {
        let mut agents = self.agents.write().await;
        *agents = urls;
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    /// Reload the pool from the store once.
    #[instrument(skip_all)]
    pub async fn refresh(&self, store: &dyn UptimeStore) {
        match store.list_monitor_agents().await {
            Ok(agents) => {
                let urls: Vec<String> = agents.into_iter().map(|a| a.url).collect();
                debug!("agent pool refreshed: {} agents", urls.len());
                self.replace(urls).await;
            }
            Err(e) => {
                warn!("agent pool refresh failed, keeping previous list: {}", e);
            }
        }
    }

    /// Spawn the periodic refresher task.
    pub fn spawn_refresher(
        pool: Arc<AgentPool>,
        store: Arc<dyn UptimeStore>,
        period: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                pool.refresh(store.as_ref()).await;
            }
        })
    }
}
