//! Pipeline orchestration: Source Reader → Reshaper → Merger → Aggregator →
//! Persisted Store.
//!
//! [`build`] runs every transform and is pure apart from reading the input
//! files. [`run`] wraps it with the optional download and the
//! replace-on-write commit. The commit only starts once `build` has
//! succeeded, so a failing run leaves the previous tables in place.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::Instrument;
use uuid::Uuid;

use crate::aggregate;
use crate::config::SourceFiles;
use crate::error::Result;
use crate::fetch;
use crate::merge;
use crate::models::{DailyReportRow, Metric, TimeSeriesPoint};
use crate::reshape;
use crate::source;
use crate::store;

// ---

/// The two tables a run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    // ---
    pub time_series: Vec<TimeSeriesPoint>,
    pub daily_report: Vec<DailyReportRow>,
}

/// Outcome of a committed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    // ---
    pub run_id: Uuid,
    pub time_series_rows: usize,
    pub daily_report_rows: usize,
}

/// Read every source file and compute both output tables.
///
/// Metric dates later than `latest_date` are rejected (see
/// [`reshape::validate_dates`]).
pub fn build(sources: &SourceFiles, latest_date: NaiveDate) -> Result<PipelineOutput> {
    // ---
    let confirmed = source::read_metric_table(&sources.confirmed, Metric::Confirmed)?;
    let deaths = source::read_metric_table(&sources.deaths, Metric::Deaths)?;
    let vaccine = source::read_vaccine_table(&sources.vaccine)?;
    let daily_report = source::read_daily_report(&sources.snapshot)?;

    reshape::validate_dates(&confirmed, latest_date)?;
    reshape::validate_dates(&deaths, latest_date)?;

    let confirmed = reshape::to_long(&confirmed)?;
    let deaths = reshape::to_long(&deaths)?;

    let merged = merge::merge(&confirmed, &deaths, &vaccine)?;
    let time_series = aggregate::by_country(&merged)?;

    tracing::info!(
        "Built {} time_series points from {} merged rows; {} daily_report rows",
        time_series.len(),
        merged.len(),
        daily_report.len()
    );

    Ok(PipelineOutput {
        time_series,
        daily_report,
    })
}

/// Run the full pipeline and replace the persisted tables.
///
/// When `source_base_url` is set the inputs are downloaded first. Parsing
/// and transforms run on a blocking worker thread.
pub async fn run(
    pool: &SqlitePool,
    sources: &SourceFiles,
    source_base_url: Option<&str>,
) -> Result<RunSummary> {
    // ---
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("pipeline", %run_id);

    async move {
        tracing::info!("Pipeline run starting");

        if let Some(base_url) = source_base_url {
            fetch::fetch_sources(base_url, sources).await?;
        }

        let today = Utc::now().date_naive();
        let worker_sources = sources.clone();
        let worker_span = tracing::Span::current();
        let output = tokio::task::spawn_blocking(move || {
            worker_span.in_scope(|| build(&worker_sources, today))
        })
        .await??;

        store::replace_all(pool, &output.time_series, &output.daily_report).await?;

        let summary = RunSummary {
            run_id,
            time_series_rows: output.time_series.len(),
            daily_report_rows: output.daily_report.len(),
        };
        tracing::info!(
            "Pipeline run complete: {} time_series rows, {} daily_report rows",
            summary.time_series_rows,
            summary.daily_report_rows
        );
        Ok(summary)
    }
    .instrument(span)
    .await
}
