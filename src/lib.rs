use serde::{Deserialize, Serialize};

pub mod actors;
pub mod aggregate;
pub mod api;
pub mod config;
pub mod pool;
pub mod probe;
pub mod storage;
pub mod throttle;
pub mod transitions;
pub mod util;

/// Check mode of a monitor. Decides which result field is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorKind {
    Web,
    Ping,
    Port,
}

impl MonitorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorKind::Web => "web",
            MonitorKind::Ping => "ping",
            MonitorKind::Port => "port",
        }
    }

    pub fn parse(value: &str) -> Option<MonitorKind> {
        match value {
            "web" => Some(MonitorKind::Web),
            "ping" => Some(MonitorKind::Ping),
            "port" => Some(MonitorKind::Port),
            _ => None,
        }
    }
}

impl std::fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP reachability result. Authoritative for `web` monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Up,
    Down,
}

impl Availability {
    /// Agents report the literal string `"Up"`; anything else (including an
    /// absent field) is normalized to the adverse variant.
    pub fn from_agent(value: Option<&str>) -> Availability {
        match value {
            Some("Up") => Availability::Up,
            _ => Availability::Down,
        }
    }

    pub fn is_adverse(&self) -> bool {
        matches!(self, Availability::Down)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Up => "Up",
            Availability::Down => "Down",
        }
    }

    pub fn parse(value: &str) -> Option<Availability> {
        match value {
            "Up" => Some(Availability::Up),
            "Down" => Some(Availability::Down),
            _ => None,
        }
    }
}

/// ICMP reachability result. Authoritative for `ping` monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reachability {
    Reachable,
    Unreachable,
}

impl Reachability {
    pub fn from_agent(value: Option<&str>) -> Reachability {
        match value {
            Some("Reachable") => Reachability::Reachable,
            _ => Reachability::Unreachable,
        }
    }

    pub fn is_adverse(&self) -> bool {
        matches!(self, Reachability::Unreachable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Reachability::Reachable => "Reachable",
            Reachability::Unreachable => "Unreachable",
        }
    }

    pub fn parse(value: &str) -> Option<Reachability> {
        match value {
            "Reachable" => Some(Reachability::Reachable),
            "Unreachable" => Some(Reachability::Unreachable),
            _ => None,
        }
    }
}

/// TCP port result. Authoritative for `port` monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortState {
    Open,
    Closed,
}

impl PortState {
    pub fn from_agent(value: Option<&str>) -> PortState {
        match value {
            Some("Open") => PortState::Open,
            _ => PortState::Closed,
        }
    }

    pub fn is_adverse(&self) -> bool {
        matches!(self, PortState::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PortState::Open => "Open",
            PortState::Closed => "Closed",
        }
    }

    pub fn parse(value: &str) -> Option<PortState> {
        match value {
            "Open" => Some(PortState::Open),
            "Closed" => Some(PortState::Closed),
            _ => None,
        }
    }
}

/// Request body POSTed to a monitor agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub url: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub kind: MonitorKind,
    pub token: String,
}

/// Response body returned by a monitor agent. Every field is optional;
/// absent fields normalize to the adverse variant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeResponse {
    pub availability: Option<String>,
    pub ping: Option<String>,
    pub port: Option<String>,
    pub data: Option<ProbeData>,
}

/// Free-form diagnostic payload from an agent: HTTP status text for `web`
/// probes, probe output for `ping`/`port`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeData {
    pub status: Option<String>,
    pub output: Option<String>,
}
