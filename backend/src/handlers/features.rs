//! Fused feature table endpoint

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::Records;

use crate::error::AppResult;
use crate::services::ReportingService;
use crate::AppState;

#[derive(Deserialize)]
pub struct FeaturesQuery {
    pub format: Option<String>, // "json" or "csv"
}

#[derive(Serialize)]
struct FeaturesResponse<'a> {
    row_count: usize,
    columns: Vec<String>,
    synthesized: &'a [String],
    rows: Records<'a>,
}

/// Get the fused rows, as JSON records or a CSV attachment
pub async fn get_features(
    State(state): State<AppState>,
    Query(query): Query<FeaturesQuery>,
) -> AppResult<Response> {
    let features = &state.snapshot.features;

    if query.format.as_deref() == Some("csv") {
        let csv = ReportingService::export_to_csv(&features.frame)?;
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"features.csv\""),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(FeaturesResponse {
            row_count: features.len(),
            columns: features.frame.columns(),
            synthesized: &features.synthesized,
            rows: features.frame.records(),
        })
        .into_response())
    }
}
