//! Risk report endpoint

use axum::{extract::State, Json};
use shared::RiskReport;

use crate::AppState;

pub async fn get_risk(State(state): State<AppState>) -> Json<RiskReport> {
    Json(state.snapshot.risk.clone())
}
