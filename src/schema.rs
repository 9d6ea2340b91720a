//! Database schema management for `covidflow`.
//!
//! Ensures the `time_series` and `daily_report` tables exist before the
//! pipeline writes or the query service reads. Applied once on startup from
//! `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::SqlitePool;

// ---

/// Create the database schema (idempotent).
///
/// `time_series` is keyed by `(country, reported_on)`, which enforces the
/// one-point-per-country-and-day invariant at the store level as well.
/// `daily_report` carries an `id` that preserves the snapshot's source order.
/// Dates are stored as ISO-8601 text.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Per-country daily history served by `/api/time-series/{country}`
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS time_series (
            country             TEXT    NOT NULL,
            reported_on         TEXT    NOT NULL,
            confirmed           INTEGER NOT NULL,
            deaths              INTEGER NOT NULL,
            doses_administered  INTEGER NOT NULL,
            PRIMARY KEY (country, reported_on)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Latest snapshot, one row per location
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_report (
            id          INTEGER PRIMARY KEY,
            country     TEXT    NOT NULL,
            province    TEXT,
            county      TEXT,
            confirmed   INTEGER NOT NULL,
            deaths      INTEGER NOT NULL,
            latitude    REAL,
            longitude   REAL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_daily_report_country
            ON daily_report (country);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::memory_pool;

    #[tokio::test]
    async fn test_create_schema_is_idempotent() -> Result<()> {
        // ---
        let pool = memory_pool().await;

        create_schema(&pool).await?;
        create_schema(&pool).await?;

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await?;

        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(names, vec!["daily_report", "time_series"]);
        Ok(())
    }
}
