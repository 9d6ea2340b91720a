//! Global map tab: headline totals, country choices and map markers.

use std::collections::HashSet;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::AppState;
use crate::query::{CountryTotal, LocationMap};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/summary", get(summary))
        .route("/api/top", get(top))
        .route("/api/countries", get(countries))
        .route("/api/locations", post(locations))
}

/// Query parameters for `/api/summary`.
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Day of the doses total; defaults to `LATEST_REPORT_DATE`.
    date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    total_cases: i64,
    total_deaths: i64,
    doses_date: NaiveDate,
    total_doses_administered: i64,
}

async fn summary(
    Query(params): Query<SummaryQuery>,
    State(state): State<AppState>,
) -> Json<SummaryResponse> {
    // ---
    let dashboard = state.dashboard().await;
    let doses_date = params.date.unwrap_or(state.config.latest_report_date);
    debug!("GET /api/summary - doses date {}", doses_date);

    Json(SummaryResponse {
        total_cases: dashboard.total_cases(),
        total_deaths: dashboard.total_deaths(),
        doses_date,
        total_doses_administered: dashboard.total_doses_at(doses_date),
    })
}

/// Query parameters for `/api/top`.
#[derive(Debug, Deserialize)]
pub struct TopQuery {
    n: Option<usize>,
}

async fn top(Query(params): Query<TopQuery>, State(state): State<AppState>) -> Json<Vec<CountryTotal>> {
    // ---
    let n = params.n.unwrap_or(state.config.top_n as usize);
    debug!("GET /api/top - n={}", n);
    Json(state.dashboard().await.top_n_by_confirmed(n))
}

#[derive(Debug, Serialize)]
struct CountriesResponse {
    /// Choices for the map's country selector.
    snapshot: Vec<String>,
    /// Choices for the time series country selector.
    time_series: Vec<String>,
}

async fn countries(State(state): State<AppState>) -> Json<CountriesResponse> {
    // ---
    let dashboard = state.dashboard().await;
    Json(CountriesResponse {
        snapshot: dashboard.countries(),
        time_series: dashboard.time_series_countries(),
    })
}

/// Body of `POST /api/locations`.
#[derive(Debug, Deserialize)]
pub struct LocationsRequest {
    /// Countries to show; the top-N preselection when omitted.
    countries: Option<Vec<String>>,
    /// Minimum marker size; defaults to `MARKER_SIZE_MIN`.
    min_size: Option<f64>,
}

async fn locations(
    State(state): State<AppState>,
    Json(request): Json<LocationsRequest>,
) -> Json<LocationMap> {
    // ---
    let dashboard = state.dashboard().await;

    let countries: HashSet<String> = match request.countries {
        Some(countries) => countries.into_iter().collect(),
        None => dashboard
            .top_n_by_confirmed(state.config.top_n as usize)
            .into_iter()
            .map(|total| total.country)
            .collect(),
    };
    let size_min = request.min_size.unwrap_or(state.config.marker_size_min);

    let map = dashboard.filter_locations(&countries, size_min);
    info!(
        "POST /api/locations - {} countries, {} markers",
        countries.len(),
        map.markers.len()
    );
    Json(map)
}
