//! Persisted Store: replace-on-write access to `time_series` and
//! `daily_report`.
//!
//! The pipeline only ever calls [`replace_all`], a single transaction that
//! clears both tables and bulk-inserts the new rows. A failure anywhere in
//! it rolls back, so readers see either the old or the new tables, never a
//! mix. The query service reads through [`load`].

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::Result;
use crate::models::{DailyReportRow, TimeSeriesPoint};

// ---

/// SQLite's default bound-parameter limit per statement.
const SQLITE_BIND_LIMIT: usize = 999;

const TIME_SERIES_COLUMNS: usize = 5;
const DAILY_REPORT_COLUMNS: usize = 8;

/// Full contents of both tables, in their canonical order.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    // ---
    /// Source order of the snapshot file.
    pub daily_report: Vec<DailyReportRow>,
    /// Ordered by country, then `reported_on`.
    pub time_series: Vec<TimeSeriesPoint>,
}

/// Replace both tables with the given rows in one transaction.
pub async fn replace_all(
    pool: &SqlitePool,
    time_series: &[TimeSeriesPoint],
    daily_report: &[DailyReportRow],
) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM time_series")
        .execute(&mut *tx)
        .await?;

    for chunk in time_series.chunks(SQLITE_BIND_LIMIT / TIME_SERIES_COLUMNS) {
        let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO time_series (country, reported_on, confirmed, deaths, doses_administered) ",
        );
        insert.push_values(chunk, |mut b, point| {
            b.push_bind(&point.country)
                .push_bind(point.reported_on)
                .push_bind(point.confirmed)
                .push_bind(point.deaths)
                .push_bind(point.doses_administered);
        });
        insert.build().execute(&mut *tx).await?;
    }

    sqlx::query("DELETE FROM daily_report")
        .execute(&mut *tx)
        .await?;

    let chunk_size = SQLITE_BIND_LIMIT / DAILY_REPORT_COLUMNS;
    for (chunk_idx, chunk) in daily_report.chunks(chunk_size).enumerate() {
        let mut insert: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO daily_report (id, country, province, county, confirmed, deaths, latitude, longitude) ",
        );
        let first_id = (chunk_idx * chunk_size) as i64 + 1;
        insert.push_values(chunk.iter().enumerate(), |mut b, (offset, row)| {
            b.push_bind(first_id + offset as i64)
                .push_bind(&row.country)
                .push_bind(&row.province)
                .push_bind(&row.county)
                .push_bind(row.confirmed)
                .push_bind(row.deaths)
                .push_bind(row.latitude)
                .push_bind(row.longitude);
        });
        insert.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Replaced time_series ({} rows) and daily_report ({} rows)",
        time_series.len(),
        daily_report.len()
    );
    Ok(())
}

/// Read both tables fully into memory.
pub async fn load(pool: &SqlitePool) -> Result<StoreSnapshot> {
    // ---
    let daily_report = sqlx::query_as::<_, DailyReportRow>(
        r#"
        SELECT country, province, county, confirmed, deaths, latitude, longitude
        FROM daily_report
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let time_series = sqlx::query_as::<_, TimeSeriesPoint>(
        r#"
        SELECT country, reported_on, confirmed, deaths, doses_administered
        FROM time_series
        ORDER BY country, reported_on
        "#,
    )
    .fetch_all(pool)
    .await?;

    tracing::debug!(
        "Loaded {} daily_report rows and {} time_series rows",
        daily_report.len(),
        time_series.len()
    );
    Ok(StoreSnapshot {
        daily_report,
        time_series,
    })
}

/// Single-connection in-memory pool; every connection of a `:memory:` pool
/// would otherwise see its own empty database.
#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}
