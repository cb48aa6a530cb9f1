//! API shared state

use std::sync::Arc;

use crate::pool::AgentPool;
use crate::storage::UptimeStore;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Store for aggregator queries
    pub store: Arc<dyn UptimeStore>,

    /// Agent pool, reported by the health endpoint
    pub pool: Arc<AgentPool>,
}

impl ApiState {
    pub fn new(store: Arc<dyn UptimeStore>, pool: Arc<AgentPool>) -> Self {
        Self { store, pool }
    }
}
