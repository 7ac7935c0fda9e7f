//! REST API for the inventory
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware (trace, CORS)
//! - **StatusStore** for CRUD and imports
//! - **StatusEngine** and the scheduler handle for on-demand tests
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check including the store
//! - `GET /api/v1/stats` - Status counts and the last cycle
//! - `GET|POST /api/v1/servers` - List / create servers
//! - `GET|PUT|DELETE /api/v1/servers/:id` - Read / replace / delete a server
//! - `POST /api/v1/servers/:id/test` - Probe one server now
//! - `POST /api/v1/servers/import` - Bulk import, each server probed once
//! - `POST /api/v1/servers/probe` - Probe an arbitrary target, not stored
//! - `GET|POST /api/v1/applications` - List / create applications
//! - `GET|PUT|DELETE /api/v1/applications/:id` - Read / replace / delete
//! - `GET /api/v1/applications/:id/servers` - Member servers
//! - `POST /api/v1/applications/:id/test` - Probe members and aggregate now
//! - `POST /api/v1/applications/import` - Bulk import
//! - `POST /api/v1/test` - Run a full cycle now

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{HealthResponse, StatsResponse};

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ApiSettings;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:3000")
    pub bind_addr: SocketAddr,

    /// Allow any origin, as the browser dashboard is served elsewhere
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            enable_cors: true,
        }
    }
}

impl From<&ApiSettings> for ApiConfig {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            bind_addr: settings.bind,
            enable_cors: settings.enable_cors,
        }
    }
}

/// Build the router with every route mounted under `/api/v1`
pub fn router(state: ApiState, enable_cors: bool) -> Router {
    use routes::{applications, health, servers, stats, testing};

    let api = Router::new()
        .route("/health", get(health::health_check))
        .route("/stats", get(stats::get_stats))
        .route(
            "/servers",
            get(servers::list_servers).post(servers::create_server),
        )
        .route("/servers/import", post(servers::import_servers))
        .route("/servers/probe", post(servers::probe_server))
        .route(
            "/servers/:id",
            get(servers::get_server)
                .put(servers::update_server)
                .delete(servers::delete_server),
        )
        .route("/servers/:id/test", post(servers::test_server))
        .route(
            "/applications",
            get(applications::list_applications).post(applications::create_application),
        )
        .route(
            "/applications/import",
            post(applications::import_applications),
        )
        .route(
            "/applications/:id",
            get(applications::get_application)
                .put(applications::update_application)
                .delete(applications::delete_application),
        )
        .route(
            "/applications/:id/servers",
            get(applications::list_members),
        )
        .route(
            "/applications/:id/test",
            post(applications::test_application),
        )
        .route("/test", post(testing::test_all));

    let mut app = Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state, config.enable_cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
