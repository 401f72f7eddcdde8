//! Per-parcel analysis endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use shared::TemporalPattern;

use crate::error::AppResult;
use crate::services::TrendService;
use crate::AppState;

/// Yield history and linear trend of a parcel
pub async fn get_parcel_trend(
    State(state): State<AppState>,
    Path(parcel_id): Path<String>,
) -> AppResult<Json<TemporalPattern>> {
    let pattern = TrendService::get_temporal_patterns(&state.snapshot.dataset, &parcel_id)?;
    Ok(Json(pattern))
}
