//! Dashboard summary endpoint

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::services::{DashboardSummary, ReportingService};
use crate::AppState;

/// Get dashboard metrics
pub async fn get_dashboard(State(state): State<AppState>) -> AppResult<Json<DashboardSummary>> {
    let snapshot = &state.snapshot;
    let summary =
        ReportingService::dashboard_summary(&snapshot.dataset, &snapshot.features, &snapshot.risk)?;
    Ok(Json(summary))
}
