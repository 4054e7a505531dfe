//! # cellgraph HTTP API Module
//!
//! Read-only HTTP API over the telemetry store, serving the network
//! dashboard.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Store counts
//! - `GET /entities` - All cell records
//! - `GET /entities/{key}` - One cell record
//! - `GET /edges` - Connectivity edges
//! - `GET /segments` - Segment predictions
//! - `GET /graph` - Node and edge elements for graph rendering
//!
//! ## Environment Variables
//!
//! - `CELLGRAPH_CORS_ORIGINS`: Comma-separated allowed origins, or "*" for all (default: localhost only)
//! - `CELLGRAPH_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)

mod handlers;
mod middleware;
mod types;

pub use handlers::{
    edges_handler, entities_handler, entity_handler, graph_handler, health_handler,
    segments_handler, status_handler,
};
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    EdgeElement, EdgeJson, ErrorResponse, GraphResponse, HealthResponse, NodeData, NodeElement,
    StatusResponse, UNCLASSIFIED_COLOR, entity_json,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::get,
};
use cellgraph_core::{CellGraphError, TelemetryStore};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Environment variable listing allowed CORS origins.
pub const CORS_ORIGINS_ENV: &str = "CELLGRAPH_CORS_ORIGINS";

/// A store shared between request handlers.
pub type SharedStore = Box<dyn TelemetryStore + Send + Sync>;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the telemetry store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<SharedStore>>,
}

impl AppState {
    #[must_use]
    pub fn new<S>(store: S) -> Self
    where
        S: TelemetryStore + Send + Sync + 'static,
    {
        Self {
            store: Arc::new(RwLock::new(Box::new(store))),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from `CELLGRAPH_CORS_ORIGINS`.
///
/// "*" allows everything, a comma-separated list allows those origins,
/// and anything else falls back to localhost only.
fn build_cors_layer() -> CorsLayer {
    match std::env::var(CORS_ORIGINS_ENV).ok().as_deref() {
        Some("*") => {
            tracing::warn!("CORS: allowing all origins ({}=*)", CORS_ORIGINS_ENV);
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => {
                        tracing::info!(origin, "CORS: allowing origin");
                        Some(value)
                    }
                    Err(e) => {
                        tracing::warn!(origin, error = %e, "CORS: invalid origin");
                        None
                    }
                })
                .collect();

            if allowed.is_empty() {
                tracing::warn!("CORS: no valid origins configured, localhost only");
                localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed)
                    .allow_methods([Method::GET, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => localhost_cors(),
    }
}

fn localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:8050",
        "http://localhost:8080",
        "http://127.0.0.1:8050",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit, rate limit.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/entities", get(handlers::entities_handler))
        .route("/entities/{key}", get(handlers::entity_handler))
        .route("/edges", get(handlers::edges_handler))
        .route("/segments", get(handlers::segments_handler))
        .route("/graph", get(handlers::graph_handler));

    let rate_limit = get_rate_limit_from_env();
    if rate_limit > 0 {
        tracing::info!(rps = rate_limit, "rate limiting enabled");
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("rate limiting disabled");
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve the API on `addr` until the process is stopped.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), CellGraphError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CellGraphError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("cellgraph HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| CellGraphError::IoError(format!("Server error: {}", e)))
}
