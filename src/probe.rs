//! Probe client: one outbound call to a monitor agent
//!
//! This client makes exactly one HTTP POST per call, with a hard 5 second
//! timeout and no retries; agent-level failover is the worker's job, not
//! this layer's.
//!
//! ## Result mapping
//!
//! The agent's response fields are normalized with exact string matching
//! (`"Up"`, `"Reachable"`, `"Open"`); anything else, including an absent
//! field, becomes the adverse variant. `response_time_ms` is wall-clock
//! time measured here, around the whole exchange, not a figure reported
//! by the agent.

use std::fmt;
use std::time::Duration;

use tracing::{instrument, trace};

use crate::storage::MonitorRow;
use crate::{Availability, MonitorKind, PortState, ProbeRequest, ProbeResponse, Reachability};

/// Hard per-call timeout.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A single normalized probe result.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub availability: Availability,
    pub ping: Reachability,
    pub port_state: PortState,
    pub reason: Option<String>,
    /// Milliseconds between send and receive, measured by this client.
    pub response_time_ms: i64,
}

/// Single error kind covering network failure, timeout, non-2xx status
/// and malformed JSON. The caller treats all of these the same way: try
/// one alternate agent, then skip the monitor for this tick.
#[derive(Debug)]
pub struct ProbeError {
    pub agent_url: String,
    pub message: String,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "probe via {} failed: {}", self.agent_url, self.message)
    }
}

impl std::error::Error for ProbeError {}

/// HTTP client for agent probes. One long-lived reqwest client, reused
/// across all workers.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    client: reqwest::Client,
    token: String,
}

impl ProbeClient {
    pub fn new(token: String) -> Self {
        Self::with_timeout(token, PROBE_TIMEOUT)
    }

    pub fn with_timeout(token: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            token,
        }
    }

    /// Probe `monitor` through the agent at `agent_url`.
    #[instrument(skip(self, monitor), fields(monitor = %monitor.id, agent = %agent_url))]
    pub async fn probe(
        &self,
        agent_url: &str,
        monitor: &MonitorRow,
    ) -> Result<ProbeOutcome, ProbeError> {
        let request = ProbeRequest {
            url: monitor.url.clone(),
            port: monitor.port,
            kind: monitor.kind,
            token: self.token.clone(),
        };

        trace!("dispatching {} probe to {}", monitor.kind, agent_url);

        let start = std::time::Instant::now();

        let response = self
            .client
            .post(agent_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProbeError {
                agent_url: agent_url.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ProbeError {
                agent_url: agent_url.to_string(),
                message: format!("HTTP error: {}", response.status()),
            });
        }

        let body: ProbeResponse = response.json().await.map_err(|e| ProbeError {
            agent_url: agent_url.to_string(),
            message: format!("malformed agent response: {}", e),
        })?;

        let response_time_ms = start.elapsed().as_millis() as i64;

        Ok(Self::normalize(monitor.kind, body, response_time_ms))
    }

    fn normalize(kind: MonitorKind, body: ProbeResponse, response_time_ms: i64) -> ProbeOutcome {
        let reason = body.data.as_ref().and_then(|data| match kind {
            MonitorKind::Web => data.status.clone(),
            MonitorKind::Ping | MonitorKind::Port => data.output.clone(),
        });

        ProbeOutcome {
            availability: Availability::from_agent(body.availability.as_deref()),
            ping: Reachability::from_agent(body.ping.as_deref()),
            port_state: PortState::from_agent(body.port.as_deref()),
            reason,
            response_time_ms,
        }
    }
}
