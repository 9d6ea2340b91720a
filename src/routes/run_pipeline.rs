use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::json;
use tracing::{debug, error, info};

use super::AppState;
use crate::{pipeline, store, Dashboard};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/pipeline/run", post(handler))
}

/// Rebuild both tables from the sources, then reload the in-memory
/// dashboard. On failure the previous tables and dashboard stay in place.
async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    // ---
    let _guard = state.run_lock.lock().await;
    info!("POST /pipeline/run - Starting pipeline");

    // Step 1: Fetch, transform and replace tables
    debug!("POST /pipeline/run - Step 1");

    let summary = match pipeline::run(
        &state.pool,
        &state.config.sources,
        state.config.source_base_url.as_deref(),
    )
    .await
    {
        Ok(summary) => summary,
        Err(e) => {
            error!("Pipeline run failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    // Step 2: Reload the query snapshot
    debug!("POST /pipeline/run - Step 2");

    match store::load(&state.pool).await {
        Ok(snapshot) => state.replace_dashboard(Dashboard::from(snapshot)).await,
        Err(e) => {
            error!("Failed to reload dashboard after run {}: {}", summary.run_id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string(), "run_id": summary.run_id })),
            )
                .into_response();
        }
    }

    info!("Pipeline run {} committed and reloaded", summary.run_id);
    (StatusCode::OK, Json(summary)).into_response()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::pipeline::tests::{write_sources, VACCINE_CSV};
    use crate::routes::test_support::{spawn_server, test_config};
    use crate::schema::create_schema;
    use crate::store::memory_pool;
    use serde_json::Value;

    #[tokio::test]
    async fn test_run_reloads_dashboard() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let sources = write_sources(dir.path(), VACCINE_CSV);
        let pool = memory_pool().await;
        create_schema(&pool).await.unwrap();
        let state = AppState::new(pool, test_config(sources), Dashboard::default());
        let base = spawn_server(state.clone()).await;

        assert!(state.dashboard().await.countries().is_empty());

        let response = reqwest::Client::new()
            .post(format!("{base}/pipeline/run"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["time_series_rows"], 4);
        assert_eq!(body["daily_report_rows"], 3);

        let dashboard = state.dashboard().await;
        assert_eq!(dashboard.countries(), vec!["Testland", "Otherland"]);
        assert_eq!(dashboard.total_cases(), 235);
    }

    #[tokio::test]
    async fn test_failed_run_reports_error() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let sources = write_sources(dir.path(), "Country_Region,Date\nTestland,2023-03-09\n");
        let pool = memory_pool().await;
        create_schema(&pool).await.unwrap();
        let state = AppState::new(pool, test_config(sources), Dashboard::default());
        let base = spawn_server(state.clone()).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/pipeline/run"))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("Province_State"));
        assert!(state.dashboard().await.countries().is_empty());
    }
}
