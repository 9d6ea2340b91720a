use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::debug;

use super::AppState;
use crate::models::TimeSeriesPoint;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/api/time-series/{country}", get(handler))
}

/// Daily history of one country, oldest first. An unknown country is an
/// empty list, not a 404: the selector may offer countries the snapshot
/// lacks.
async fn handler(Path(country): Path<String>, State(state): State<AppState>) -> Json<Vec<TimeSeriesPoint>> {
    // ---
    let slice = state.dashboard().await.time_slice_for(&country);
    debug!("GET /api/time-series/{} - {} points", country, slice.len());
    Json(slice)
}
