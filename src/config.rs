use tracing::trace;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// SQLite database path; omit to run on the in-memory store.
    pub database: Option<String>,

    /// Shared secret sent to agents with every probe. Falls back to the
    /// `LOOKOUT_TOKEN` environment variable.
    pub agent_token: Option<String>,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// How often the agent pool is reloaded from the store.
    #[serde(default = "default_pool_refresh")]
    pub pool_refresh_minutes: u64,

    pub api: Option<ApiSection>,

    /// Agents seeded into the store at startup when none are registered.
    pub agents: Option<Vec<AgentSeed>>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiSection {
    pub bind: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AgentSeed {
    pub region: String,
    pub url: String,
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_page_size() -> usize {
    100
}

fn default_pool_refresh() -> u64 {
    60
}

impl Config {
    /// Resolve the agent token from config or environment.
    pub fn resolve_token(&self) -> Option<String> {
        self.agent_token.clone().or_else(crate::util::get_token)
    }

    /// Resolve the database path from config or environment.
    pub fn resolve_database(&self) -> Option<String> {
        self.database.clone().or_else(crate::util::get_db_path)
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config: &Config| trace!("loaded config: {config:?}"))
}
