//! Chart feed endpoint

use axum::{extract::State, Json};
use shared::ChartFeeds;

use crate::AppState;

pub async fn get_charts(State(state): State<AppState>) -> Json<ChartFeeds> {
    Json(state.snapshot.charts.clone())
}
