//! Read-only REST surface over the aggregators
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Store-backed**: handlers query the shared `UptimeStore` through
//!   the read aggregators; nothing here writes
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/stats?user_id=` - Up/down/paused counts
//! - `GET /api/v1/monitors/:id/uptime?days=` - Rolling uptime %
//! - `GET /api/v1/monitors/:id/events?page=` - Paged event history
//! - `GET /api/v1/downtime/latest?user_id=` - Latest downtime
//!
//! Monitor/user/contact CRUD lives in a separate collaborator service
//! that shares the store; the pipeline never calls into it.

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod types;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;
#[cfg(feature = "api")]
pub use types::{
    DowntimeResponse, EventsResponse, HealthResponse, StatsResponse, UptimeResponse,
};

use std::net::SocketAddr;

#[cfg(feature = "api")]
use axum::{routing::get, Router};
#[cfg(feature = "api")]
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Enable CORS for dashboards
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
            enable_cors: true,
        }
    }
}

/// Build the router with all read routes.
#[cfg(feature = "api")]
pub fn router(state: ApiState, enable_cors: bool) -> Router {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route(
            "/api/v1/monitors/:id/uptime",
            get(routes::monitors::get_uptime),
        )
        .route(
            "/api/v1/monitors/:id/events",
            get(routes::monitors::get_events),
        )
        .route(
            "/api/v1/downtime/latest",
            get(routes::stats::latest_downtime),
        );

    if enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Spawn the API server in a background task; returns the bound address.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state, config.enable_cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(local_addr)
}
