//! Row definitions for the persisted collections
//!
//! ## Design Philosophy
//!
//! Four collections back the probing pipeline:
//!
//! - `monitors`: user-owned probe configurations, written by the REST
//!   collaborator and consumed here. The pipeline only touches
//!   `updated_at` and `last_alert_sent_at`.
//! - `uptime_events`: append-only state-transition log. Immutable once
//!   written except for `end_time`, which the very next transition of the
//!   same monitor sets exactly once.
//! - `alerts`: durable intent-to-notify queue drained by an external
//!   delivery worker.
//! - `monitor_agents`: registered probe agents; only rows of type
//!   `monitorAgents` are dispatched to.
//!
//! Every event stores all three result fields. The field matching the
//! monitor's kind is authoritative; the others are normalized from whatever
//! the agent returned (adverse when absent) so the schema stays rectangular.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Availability, MonitorKind, PortState, Reachability};

use super::error::{StorageError, StorageResult};

/// Permitted probe cadences, in minutes. One scheduler bucket each.
pub const FREQUENCIES: [u32; 5] = [1, 5, 10, 30, 60];

/// Permitted minimum gaps between two alerts of one monitor, in minutes.
pub const ALERT_FREQUENCIES: [u32; 7] = [1, 5, 10, 20, 30, 60, 1440];

/// A monitor: one endpoint to be probed periodically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorRow {
    /// Identifier assigned by the REST collaborator on create.
    pub id: String,

    /// Owning user. Required on create; the pipeline tolerates absence and
    /// then never emits alerts for the monitor.
    pub user_id: Option<String>,

    /// Check mode. Changing it through the REST surface makes the next
    /// probe a fresh transition (see the detector).
    pub kind: MonitorKind,

    /// HTTP(S) URL for `web`, host or IP for `ping`/`port`.
    pub url: String,

    #[serde(default = "crate::util::get_default_port")]
    pub port: u16,

    /// Probe cadence in minutes; must be one of [`FREQUENCIES`].
    pub frequency: u32,

    /// Minimum gap between alerts in minutes; one of [`ALERT_FREQUENCIES`].
    pub alert_frequency: u32,

    #[serde(default)]
    pub is_paused: bool,

    pub last_alert_sent_at: Option<DateTime<Utc>>,

    /// Bumped on every completed worker run. Monotonically non-decreasing;
    /// the scheduler's due-set predicate keys off it.
    pub updated_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,

    pub name: Option<String>,

    /// Contact ids for the delivery worker; opaque to the pipeline.
    #[serde(default)]
    pub contacts: Vec<String>,
}

impl MonitorRow {
    /// Check the enumeration invariants on `frequency` and `alert_frequency`.
    pub fn validate(&self) -> StorageResult<()> {
        if !FREQUENCIES.contains(&self.frequency) {
            return Err(StorageError::InvalidRow(format!(
                "frequency {} is not one of {:?}",
                self.frequency, FREQUENCIES
            )));
        }
        if !ALERT_FREQUENCIES.contains(&self.alert_frequency) {
            return Err(StorageError::InvalidRow(format!(
                "alert frequency {} is not one of {:?}",
                self.alert_frequency, ALERT_FREQUENCIES
            )));
        }
        Ok(())
    }

    pub fn display(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.url.clone())
    }
}

/// One observed state transition of a monitor.
///
/// For any monitor the events are totally ordered by `timestamp`, and
/// `end_time` of event N equals `timestamp` of event N+1 (null on the
/// latest event). Between two consecutive events the monitor's
/// authoritative state is constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    /// Store-assigned identifier.
    pub id: i64,

    pub monitor_id: String,

    pub user_id: Option<String>,

    /// When the transition was observed.
    pub timestamp: DateTime<Utc>,

    /// Set exactly once, by the next transition of the same monitor.
    pub end_time: Option<DateTime<Utc>>,

    /// Copy of the monitor's kind at observation time.
    pub kind: MonitorKind,

    pub availability: Availability,
    pub ping: Reachability,
    pub port_state: PortState,

    /// Wall-clock milliseconds measured by the probe client, not the agent.
    pub response_time_ms: i64,

    /// URL of the agent whose response was ultimately recorded (the
    /// verifier when verification ran, else the primary).
    pub confirmed_by_agent: String,

    /// Copied from the agent: HTTP status text for web, output otherwise.
    pub reason: Option<String>,
}

impl EventRow {
    /// Whether the field authoritative for this event's own kind carries
    /// the adverse value.
    pub fn is_adverse(&self) -> bool {
        match self.kind {
            MonitorKind::Web => self.availability.is_adverse(),
            MonitorKind::Ping => self.ping.is_adverse(),
            MonitorKind::Port => self.port_state.is_adverse(),
        }
    }

    /// Whether any of the three result fields carries an adverse value.
    pub fn has_adverse_field(&self) -> bool {
        self.availability.is_adverse() || self.ping.is_adverse() || self.port_state.is_adverse()
    }
}

/// An intent-to-notify record. The pipeline appends; a delivery worker
/// consumes and retries up to `max_tries`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRow {
    pub id: i64,
    pub user_id: String,
    pub monitor_id: String,
    pub url: String,
    pub tries: u32,
    pub max_tries: u32,
    pub created_at: DateTime<Utc>,
}

impl AlertRow {
    pub fn new(
        user_id: String,
        monitor_id: String,
        url: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            user_id,
            monitor_id,
            url,
            tries: 0,
            max_tries: 3,
            created_at,
        }
    }
}

/// Which dispatch pool an agent registration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentType {
    MonitorAgents,
    AlertAgents,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::MonitorAgents => "monitorAgents",
            AgentType::AlertAgents => "alertAgents",
        }
    }

    pub fn parse(value: &str) -> Option<AgentType> {
        match value {
            "monitorAgents" => Some(AgentType::MonitorAgents),
            "alertAgents" => Some(AgentType::AlertAgents),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered probe agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRow {
    pub id: i64,
    pub agent_type: AgentType,
    /// Label only; selection ignores it.
    pub region: String,
    /// Absolute HTTP endpoint.
    pub url: String,
}
