//! Route definitions for the agricultural monitoring API

use axum::{routing::get, Router};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Pipeline output
        .route("/features", get(handlers::get_features))
        .route("/risk", get(handlers::get_risk))
        .route("/parcels/:parcel_id/trend", get(handlers::get_parcel_trend))
        // Presentation feeds
        .route("/charts", get(handlers::get_charts))
        .route("/map", get(handlers::get_map))
        .route("/dashboard", get(handlers::get_dashboard))
}
