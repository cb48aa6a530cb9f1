//! SQLite store implementation
//!
//! ## Features
//!
//! - **Embedded**: no separate database server required
//! - **WAL mode**: readers stay unblocked during pipeline writes
//! - **Connection pooling**: one pool shared by schedulers, workers, API
//! - **Migrations**: automatic schema versioning with sqlx
//!
//! ## Concurrency
//!
//! The pipeline only ever needs single-row atomicity (event append,
//! `end_time` close, monitor touch), which SQLite gives per statement.
//! The due-set predicate plus the `updated_at` bump keeps two workers off
//! the same monitor within one scheduler process; nothing here locks
//! across rows.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};

use crate::{Availability, MonitorKind, PortState, Reachability};

use super::backend::{HealthStatus, UptimeStore};
use super::error::{StorageError, StorageResult};
use super::schema::{AgentRow, AgentType, AlertRow, EventRow, MonitorRow};

/// SQLite-backed store. Suitable for a single control-plane instance;
/// horizontally scaled deployments need a server database and an atomic
/// lease in place of the due-set predicate.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `db_path` and run
    /// migrations.
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn from_millis(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn monitor_from_row(row: &SqliteRow) -> StorageResult<MonitorRow> {
        let kind_str: String = row.get("kind");
        let kind = MonitorKind::parse(&kind_str).ok_or_else(|| {
            StorageError::SerializationError(format!("unknown monitor kind: {}", kind_str))
        })?;

        let contacts_json: String = row.get("contacts");
        let contacts: Vec<String> = serde_json::from_str(&contacts_json).map_err(|e| {
            StorageError::SerializationError(format!("failed to parse contacts: {}", e))
        })?;

        Ok(MonitorRow {
            id: row.get("id"),
            user_id: row.get("user_id"),
            kind,
            url: row.get("url"),
            port: row.get::<i64, _>("port") as u16,
            frequency: row.get::<i64, _>("frequency") as u32,
            alert_frequency: row.get::<i64, _>("alert_frequency") as u32,
            is_paused: row.get::<i64, _>("is_paused") != 0,
            last_alert_sent_at: row
                .get::<Option<i64>, _>("last_alert_sent_at")
                .map(Self::from_millis),
            updated_at: Self::from_millis(row.get("updated_at")),
            created_at: Self::from_millis(row.get("created_at")),
            name: row.get("name"),
            contacts,
        })
    }

    fn event_from_row(row: &SqliteRow) -> StorageResult<EventRow> {
        let kind_str: String = row.get("kind");
        let kind = MonitorKind::parse(&kind_str).ok_or_else(|| {
            StorageError::SerializationError(format!("unknown event kind: {}", kind_str))
        })?;

        // Result fields: unknown stored values fall back to the adverse
        // variant, matching the wire normalization rule.
        let availability_str: String = row.get("availability");
        let ping_str: String = row.get("ping");
        let port_str: String = row.get("port_state");

        Ok(EventRow {
            id: row.get("id"),
            monitor_id: row.get("monitor_id"),
            user_id: row.get("user_id"),
            timestamp: Self::from_millis(row.get("timestamp")),
            end_time: row.get::<Option<i64>, _>("end_time").map(Self::from_millis),
            kind,
            availability: Availability::parse(&availability_str).unwrap_or(Availability::Down),
            ping: Reachability::parse(&ping_str).unwrap_or(Reachability::Unreachable),
            port_state: PortState::parse(&port_str).unwrap_or(PortState::Closed),
            response_time_ms: row.get("response_time_ms"),
            confirmed_by_agent: row.get("confirmed_by_agent"),
            reason: row.get("reason"),
        })
    }

    fn alert_from_row(row: &SqliteRow) -> AlertRow {
        AlertRow {
            id: row.get("id"),
            user_id: row.get("user_id"),
            monitor_id: row.get("monitor_id"),
            url: row.get("url"),
            tries: row.get::<i64, _>("tries") as u32,
            max_tries: row.get::<i64, _>("max_tries") as u32,
            created_at: Self::from_millis(row.get("created_at")),
        }
    }

    const EVENT_COLUMNS: &'static str = "id, monitor_id, user_id, timestamp, end_time, kind, \
         availability, ping, port_state, response_time_ms, confirmed_by_agent, reason";

    const MONITOR_COLUMNS: &'static str = "id, user_id, kind, url, port, frequency, \
         alert_frequency, is_paused, last_alert_sent_at, updated_at, created_at, name, contacts";
}

#[async_trait]
impl UptimeStore for SqliteStore {
    #[instrument(skip(self), fields(frequency = frequency))]
    async fn due_monitors(
        &self,
        frequency: u32,
        cutoff: DateTime<Utc>,
        after_id: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<MonitorRow>> {
        let sql = format!(
            "SELECT {} FROM monitors \
             WHERE frequency = ? AND is_paused = 0 AND updated_at <= ? AND id > ? \
             ORDER BY id ASC LIMIT ?",
            Self::MONITOR_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(frequency as i64)
            .bind(Self::to_millis(&cutoff))
            .bind(after_id.unwrap_or(""))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let monitors: StorageResult<Vec<MonitorRow>> =
            rows.iter().map(Self::monitor_from_row).collect();
        let monitors = monitors?;

        debug!("due-set query returned {} monitors", monitors.len());
        Ok(monitors)
    }

    async fn get_monitor(&self, id: &str) -> StorageResult<Option<MonitorRow>> {
        let sql = format!("SELECT {} FROM monitors WHERE id = ?", Self::MONITOR_COLUMNS);

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::monitor_from_row).transpose()
    }

    async fn insert_monitor(&self, monitor: &MonitorRow) -> StorageResult<()> {
        monitor.validate()?;

        let contacts_json = serde_json::to_string(&monitor.contacts).map_err(|e| {
            StorageError::SerializationError(format!("failed to serialize contacts: {}", e))
        })?;

        sqlx::query(
            "INSERT INTO monitors (id, user_id, kind, url, port, frequency, alert_frequency, \
             is_paused, last_alert_sent_at, updated_at, created_at, name, contacts) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&monitor.id)
        .bind(&monitor.user_id)
        .bind(monitor.kind.as_str())
        .bind(&monitor.url)
        .bind(monitor.port as i64)
        .bind(monitor.frequency as i64)
        .bind(monitor.alert_frequency as i64)
        .bind(monitor.is_paused as i64)
        .bind(monitor.last_alert_sent_at.as_ref().map(Self::to_millis))
        .bind(Self::to_millis(&monitor.updated_at))
        .bind(Self::to_millis(&monitor.created_at))
        .bind(&monitor.name)
        .bind(contacts_json)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn monitors_for_user(&self, user_id: &str) -> StorageResult<Vec<MonitorRow>> {
        let sql = format!(
            "SELECT {} FROM monitors WHERE user_id = ? ORDER BY created_at ASC",
            Self::MONITOR_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::monitor_from_row).collect()
    }

    async fn touch_monitor(&self, id: &str, now: DateTime<Utc>) -> StorageResult<()> {
        // MAX keeps updated_at monotonic even if a stale worker lands late.
        sqlx::query("UPDATE monitors SET updated_at = MAX(updated_at, ?) WHERE id = ?")
            .bind(Self::to_millis(&now))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn set_last_alert_sent(&self, id: &str, now: DateTime<Utc>) -> StorageResult<()> {
        sqlx::query("UPDATE monitors SET last_alert_sent_at = ? WHERE id = ?")
            .bind(Self::to_millis(&now))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn set_paused(&self, id: &str, paused: bool) -> StorageResult<()> {
        sqlx::query("UPDATE monitors SET is_paused = ? WHERE id = ?")
            .bind(paused as i64)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn latest_event(&self, monitor_id: &str) -> StorageResult<Option<EventRow>> {
        let sql = format!(
            "SELECT {} FROM uptime_events WHERE monitor_id = ? \
             ORDER BY timestamp DESC LIMIT 1",
            Self::EVENT_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(monitor_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::event_from_row).transpose()
    }

    #[instrument(skip(self, event), fields(monitor_id = %event.monitor_id))]
    async fn insert_event(&self, event: &EventRow) -> StorageResult<i64> {
        let result = sqlx::query(
            "INSERT INTO uptime_events (monitor_id, user_id, timestamp, end_time, kind, \
             availability, ping, port_state, response_time_ms, confirmed_by_agent, reason) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.monitor_id)
        .bind(&event.user_id)
        .bind(Self::to_millis(&event.timestamp))
        .bind(event.end_time.as_ref().map(Self::to_millis))
        .bind(event.kind.as_str())
        .bind(event.availability.as_str())
        .bind(event.ping.as_str())
        .bind(event.port_state.as_str())
        .bind(event.response_time_ms)
        .bind(&event.confirmed_by_agent)
        .bind(&event.reason)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    async fn close_event(&self, event_id: i64, end_time: DateTime<Utc>) -> StorageResult<()> {
        // end_time is written exactly once; a second close is a no-op.
        sqlx::query("UPDATE uptime_events SET end_time = ? WHERE id = ? AND end_time IS NULL")
            .bind(Self::to_millis(&end_time))
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    async fn events_since(
        &self,
        monitor_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<EventRow>> {
        let sql = format!(
            "SELECT {} FROM uptime_events WHERE monitor_id = ? AND timestamp >= ? \
             ORDER BY timestamp ASC",
            Self::EVENT_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(monitor_id)
            .bind(Self::to_millis(&since))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::event_from_row).collect()
    }

    async fn events_page(
        &self,
        monitor_id: &str,
        page: usize,
        per_page: usize,
    ) -> StorageResult<Vec<EventRow>> {
        let sql = format!(
            "SELECT {} FROM uptime_events WHERE monitor_id = ? \
             ORDER BY timestamp DESC LIMIT ? OFFSET ?",
            Self::EVENT_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(monitor_id)
            .bind(per_page as i64)
            .bind((page * per_page) as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::event_from_row).collect()
    }

    async fn latest_adverse_event(
        &self,
        user_id: Option<&str>,
    ) -> StorageResult<Option<EventRow>> {
        let user_clause = if user_id.is_some() {
            "AND user_id = ?"
        } else {
            ""
        };

        let sql = format!(
            "SELECT {} FROM uptime_events \
             WHERE (availability = 'Down' OR ping = 'Unreachable' OR port_state = 'Closed') {} \
             ORDER BY timestamp DESC LIMIT 1",
            Self::EVENT_COLUMNS,
            user_clause
        );

        let mut query = sqlx::query(&sql);
        if let Some(user) = user_id {
            query = query.bind(user);
        }

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::event_from_row).transpose()
    }

    #[instrument(skip(self, alert), fields(monitor_id = %alert.monitor_id))]
    async fn insert_alert(&self, alert: &AlertRow) -> StorageResult<i64> {
        let result = sqlx::query(
            "INSERT INTO alerts (user_id, monitor_id, url, tries, max_tries, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&alert.user_id)
        .bind(&alert.monitor_id)
        .bind(&alert.url)
        .bind(alert.tries as i64)
        .bind(alert.max_tries as i64)
        .bind(Self::to_millis(&alert.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    async fn alerts_for_user(&self, user_id: &str) -> StorageResult<Vec<AlertRow>> {
        let rows = sqlx::query(
            "SELECT id, user_id, monitor_id, url, tries, max_tries, created_at \
             FROM alerts WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(rows.iter().map(Self::alert_from_row).collect())
    }

    async fn list_monitor_agents(&self) -> StorageResult<Vec<AgentRow>> {
        let rows = sqlx::query(
            "SELECT id, agent_type, region, url FROM monitor_agents \
             WHERE agent_type = 'monitorAgents' ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let type_str: String = row.get("agent_type");
                let agent_type = AgentType::parse(&type_str).ok_or_else(|| {
                    StorageError::SerializationError(format!("unknown agent type: {}", type_str))
                })?;

                Ok(AgentRow {
                    id: row.get("id"),
                    agent_type,
                    region: row.get("region"),
                    url: row.get("url"),
                })
            })
            .collect()
    }

    async fn insert_agent(&self, agent: &AgentRow) -> StorageResult<i64> {
        let result = sqlx::query(
            "INSERT INTO monitor_agents (agent_type, region, url) VALUES (?, ?, ?)",
        )
        .bind(agent.agent_type.as_str())
        .bind(&agent.region)
        .bind(&agent.url)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite store operational".to_string(),
                    metadata,
                })
            }
            Err(e) => Ok(HealthStatus {
                healthy: false,
                message: format!("health check failed: {}", e),
                metadata: HashMap::new(),
            }),
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite store");
        self.pool.close().await;
        Ok(())
    }
}
