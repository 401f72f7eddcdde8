//! Agricultural monitoring analytics
//!
//! Loads crop monitoring, weather, soil and yield history CSV files, fuses
//! them into one feature table, derives risk scores and yield trends, and
//! serves the results together with chart and map feeds.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod snapshot;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use snapshot::Snapshot;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<Snapshot>,
    pub config: Arc<Config>,
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Agricultural Monitoring API v1.0"
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
