// src/routes/health.rs
//! Health check endpoint for the covidflow query service.
//!
//! Sibling module in the `routes` directory following the Explicit Module
//! Boundary Pattern (EMBP): the handler stays private and the gateway
//! (`mod.rs`) merges the exported subrouter. Besides liveness it reports the
//! size of the loaded snapshot, which makes an empty store easy to spot.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::AppState;

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    snapshot_countries: usize,
    time_series_countries: usize,
}

/// Handle `GET /health`.
///
/// Reads only the in-memory snapshot; never touches the database.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let dashboard = state.dashboard().await;
    Json(HealthResponse {
        status: "ok",
        snapshot_countries: dashboard.countries().len(),
        time_series_countries: dashboard.time_series_countries().len(),
    })
}

/// Create a subrouter containing the `/health` route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
