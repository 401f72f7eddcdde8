//! Map layer endpoint

use axum::{extract::State, Json};
use shared::MapLayers;

use crate::AppState;

pub async fn get_map(State(state): State<AppState>) -> Json<MapLayers> {
    Json(state.snapshot.map.clone())
}
