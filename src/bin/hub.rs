use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use lookout::{
    actors::scheduler::SchedulerSet,
    config::{read_config_file, Config},
    pool::AgentPool,
    probe::ProbeClient,
    storage::{AgentRow, AgentType, MemoryStore, UptimeStore},
};
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("lookout", LevelFilter::TRACE),
        ("hub", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    run_control_plane(config).await?;

    Ok(())
}

/// Run the probing control plane until a shutdown signal arrives
async fn run_control_plane(config: Config) -> anyhow::Result<()> {
    let Some(token) = config.resolve_token() else {
        anyhow::bail!("no agent token configured (set agent_token or LOOKOUT_TOKEN)");
    };

    // Store connect is the only fatal failure: nothing can run without it.
    let store: Arc<dyn UptimeStore> = match config.resolve_database() {
        #[cfg(feature = "storage-sqlite")]
        Some(path) => {
            let store = lookout::storage::SqliteStore::new(&path).await?;
            info!("using SQLite store at {path}");
            Arc::new(store)
        }
        #[cfg(not(feature = "storage-sqlite"))]
        Some(path) => {
            warn!("built without storage-sqlite, ignoring database path {path}");
            Arc::new(MemoryStore::new())
        }
        None => {
            warn!("no database configured, events will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };

    // Seed configured agents when the registry is empty.
    if let Some(seeds) = &config.agents {
        let registered = store.list_monitor_agents().await?;
        if registered.is_empty() {
            for seed in seeds {
                store
                    .insert_agent(&AgentRow {
                        id: 0,
                        agent_type: AgentType::MonitorAgents,
                        region: seed.region.clone(),
                        url: seed.url.clone(),
                    })
                    .await?;
                info!("registered monitor agent {} ({})", seed.url, seed.region);
            }
        }
    }

    let pool = Arc::new(AgentPool::empty());
    pool.refresh(store.as_ref()).await;
    if pool.is_empty().await {
        warn!("agent pool is empty, probes will be skipped until agents register");
    }

    let refresher = AgentPool::spawn_refresher(
        pool.clone(),
        store.clone(),
        Duration::from_secs(config.pool_refresh_minutes * 60),
    );

    let probe = ProbeClient::with_timeout(
        token,
        Duration::from_secs(config.probe_timeout_secs),
    );

    let schedulers = SchedulerSet::start(store.clone(), pool.clone(), probe, config.page_size);
    info!("all bucket schedulers started, probing active");

    #[cfg(feature = "api")]
    if let Some(api) = &config.api {
        let api_config = lookout::api::ApiConfig {
            bind_addr: api.bind.parse()?,
            enable_cors: true,
        };
        let state = lookout::api::ApiState::new(store.clone(), pool.clone());
        let addr = lookout::api::spawn_api_server(api_config, state).await?;
        info!("read API listening on {addr}");
    }

    info!("press Ctrl+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("received shutdown signal, stopping schedulers...");
        }
        Err(err) => {
            error!("unable to listen for shutdown signal: {err}");
        }
    }

    // Graceful teardown: stop tickers (in-flight pages finish), stop the
    // pool refresher, then close the store.
    schedulers.stop().await;
    refresher.abort();
    store.close().await?;

    info!("all schedulers stopped, exiting");

    Ok(())
}
