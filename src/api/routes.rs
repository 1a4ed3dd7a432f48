//! API Routes
//!
//! Configures the Axum router with all region cache endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    create_region_handler, get_handler, health_handler, list_regions_handler, put_handler,
    stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /regions` - Build a region with explicit options
/// - `GET /regions` - List regions
/// - `PUT /regions/:region/entries` - Write and commit a key-value pair
/// - `GET /regions/:region/entries/:key` - Read a value by key
/// - `GET /stats` - Transaction and per-region statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/regions",
            post(create_region_handler).get(list_regions_handler),
        )
        .route("/regions/:region/entries", put(put_handler))
        .route("/regions/:region/entries/:key", get(get_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
