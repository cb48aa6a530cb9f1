//! In-memory store (no persistence)
//!
//! Backs tests and database-less runs. Implements the full `UptimeStore`
//! contract over plain maps behind a `tokio::sync::RwLock`, with the same
//! ordering and pagination semantics as the SQLite store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, UptimeStore};
use super::error::{StorageError, StorageResult};
use super::schema::{AgentRow, AgentType, AlertRow, EventRow, MonitorRow};

#[derive(Default)]
struct Inner {
    monitors: HashMap<String, MonitorRow>,
    events: Vec<EventRow>,
    alerts: Vec<AlertRow>,
    agents: Vec<AgentRow>,
    next_event_id: i64,
    next_alert_id: i64,
    next_agent_id: i64,
}

/// In-memory store with interior mutability.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_event_id: 1,
                next_alert_id: 1,
                next_agent_id: 1,
                ..Inner::default()
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UptimeStore for MemoryStore {
    async fn due_monitors(
        &self,
        frequency: u32,
        cutoff: DateTime<Utc>,
        after_id: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<MonitorRow>> {
        let inner = self.inner.read().await;

        let mut due: Vec<MonitorRow> = inner
            .monitors
            .values()
            .filter(|m| {
                m.frequency == frequency
                    && !m.is_paused
                    && m.updated_at <= cutoff
                    && after_id.map_or(true, |after| m.id.as_str() > after)
            })
            .cloned()
            .collect();

        due.sort_by(|a, b| a.id.cmp(&b.id));
        due.truncate(limit);

        debug!("due-set query returned {} monitors", due.len());
        Ok(due)
    }

    async fn get_monitor(&self, id: &str) -> StorageResult<Option<MonitorRow>> {
        let inner = self.inner.read().await;
        Ok(inner.monitors.get(id).cloned())
    }

    async fn insert_monitor(&self, monitor: &MonitorRow) -> StorageResult<()> {
        monitor.validate()?;

        let mut inner = self.inner.write().await;
        inner.monitors.insert(monitor.id.clone(), monitor.clone());
        Ok(())
    }

    async fn monitors_for_user(&self, user_id: &str) -> StorageResult<Vec<MonitorRow>> {
        let inner = self.inner.read().await;

        let mut monitors: Vec<MonitorRow> = inner
            .monitors
            .values()
            .filter(|m| m.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect();

        monitors.sort_by_key(|m| m.created_at);
        Ok(monitors)
    }

    async fn touch_monitor(&self, id: &str, now: DateTime<Utc>) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        let monitor = inner
            .monitors
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("monitor {}", id)))?;

        // updated_at never moves backwards
        if now > monitor.updated_at {
            monitor.updated_at = now;
        }
        Ok(())
    }

    async fn set_last_alert_sent(&self, id: &str, now: DateTime<Utc>) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        let monitor = inner
            .monitors
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("monitor {}", id)))?;

        monitor.last_alert_sent_at = Some(now);
        Ok(())
    }

    async fn set_paused(&self, id: &str, paused: bool) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        let monitor = inner
            .monitors
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("monitor {}", id)))?;

        monitor.is_paused = paused;
        Ok(())
    }

    async fn latest_event(&self, monitor_id: &str) -> StorageResult<Option<EventRow>> {
        let inner = self.inner.read().await;

        Ok(inner
            .events
            .iter()
            .filter(|e| e.monitor_id == monitor_id)
            .max_by_key(|e| (e.timestamp, e.id))
            .cloned())
    }

    async fn insert_event(&self, event: &EventRow) -> StorageResult<i64> {
        let mut inner = self.inner.write().await;

        let id = inner.next_event_id;
        inner.next_event_id += 1;

        let mut row = event.clone();
        row.id = id;
        inner.events.push(row);

        Ok(id)
    }

    async fn close_event(&self, event_id: i64, end_time: DateTime<Utc>) -> StorageResult<()> {
        let mut inner = self.inner.write().await;

        if let Some(event) = inner.events.iter_mut().find(|e| e.id == event_id) {
            if event.end_time.is_none() {
                event.end_time = Some(end_time);
            }
        }
        Ok(())
    }

    async fn events_since(
        &self,
        monitor_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<EventRow>> {
        let inner = self.inner.read().await;

        let mut events: Vec<EventRow> = inner
            .events
            .iter()
            .filter(|e| e.monitor_id == monitor_id && e.timestamp >= since)
            .cloned()
            .collect();

        events.sort_by_key(|e| (e.timestamp, e.id));
        Ok(events)
    }

    async fn events_page(
        &self,
        monitor_id: &str,
        page: usize,
        per_page: usize,
    ) -> StorageResult<Vec<EventRow>> {
        let inner = self.inner.read().await;

        let mut events: Vec<EventRow> = inner
            .events
            .iter()
            .filter(|e| e.monitor_id == monitor_id)
            .cloned()
            .collect();

        events.sort_by_key(|e| std::cmp::Reverse((e.timestamp, e.id)));

        Ok(events
            .into_iter()
            .skip(page * per_page)
            .take(per_page)
            .collect())
    }

    async fn latest_adverse_event(
        &self,
        user_id: Option<&str>,
    ) -> StorageResult<Option<EventRow>> {
        let inner = self.inner.read().await;

        Ok(inner
            .events
            .iter()
            .filter(|e| e.has_adverse_field())
            .filter(|e| user_id.map_or(true, |u| e.user_id.as_deref() == Some(u)))
            .max_by_key(|e| (e.timestamp, e.id))
            .cloned())
    }

    async fn insert_alert(&self, alert: &AlertRow) -> StorageResult<i64> {
        let mut inner = self.inner.write().await;

        let id = inner.next_alert_id;
        inner.next_alert_id += 1;

        let mut row = alert.clone();
        row.id = id;
        inner.alerts.push(row);

        Ok(id)
    }

    async fn alerts_for_user(&self, user_id: &str) -> StorageResult<Vec<AlertRow>> {
        let inner = self.inner.read().await;

        let mut alerts: Vec<AlertRow> = inner
            .alerts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();

        alerts.sort_by_key(|a| std::cmp::Reverse((a.created_at, a.id)));
        Ok(alerts)
    }

    async fn list_monitor_agents(&self) -> StorageResult<Vec<AgentRow>> {
        let inner = self.inner.read().await;

        Ok(inner
            .agents
            .iter()
            .filter(|a| a.agent_type == AgentType::MonitorAgents)
            .cloned()
            .collect())
    }

    async fn insert_agent(&self, agent: &AgentRow) -> StorageResult<i64> {
        let mut inner = self.inner.write().await;

        let id = inner.next_agent_id;
        inner.next_agent_id += 1;

        let mut row = agent.clone();
        row.id = id;
        inner.agents.push(row);

        Ok(id)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let inner = self.inner.read().await;

        Ok(HealthStatus {
            healthy: true,
            message: "in-memory store operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("monitors".to_string(), inner.monitors.len().to_string()),
                ("events".to_string(), inner.events.len().to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
