//! Reshaper: wide metric tables to long form.
//!
//! Every date column of a [`RawMetricTable`] becomes one [`LongMetricRow`]
//! per identifier row. Latitude and longitude are not part of the long-form
//! schema and are dropped here.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::error::{PipelineError, Result};
use crate::models::{LongMetricRow, RawMetricTable};

// ---

/// Melt a wide table into one row per `(province, country, date)`, in
/// source row order then date column order.
///
/// Fails if the same `(province, country)` identifier occurs twice, since
/// the long form would then carry duplicate keys.
pub fn to_long(table: &RawMetricTable) -> Result<Vec<LongMetricRow>> {
    // ---
    let mut seen = HashSet::with_capacity(table.rows.len());
    let mut long = Vec::with_capacity(table.rows.len() * table.dates.len());

    for row in &table.rows {
        if !seen.insert((row.province.as_deref(), row.country.as_str())) {
            return Err(PipelineError::source_format(
                &table.source,
                format!(
                    "{} location {}{} appears more than once",
                    table.metric,
                    row.country,
                    row.province
                        .as_deref()
                        .map(|p| format!("/{p}"))
                        .unwrap_or_default()
                ),
            ));
        }

        for (reported_on, value) in table.dates.iter().zip(&row.values) {
            long.push(LongMetricRow {
                country: row.country.clone(),
                province: row.province.clone(),
                reported_on: *reported_on,
                value: *value,
            });
        }
    }

    tracing::debug!(
        "Reshaped {} table: {} wide rows -> {} long rows",
        table.metric,
        table.rows.len(),
        long.len()
    );
    Ok(long)
}

/// Reject date headers later than `latest`.
///
/// Two-digit years are resolved as 20YY; a date in the future is what a
/// wrong century assumption looks like, so it is treated as a format error
/// instead of being silently accepted.
pub fn validate_dates(table: &RawMetricTable, latest: NaiveDate) -> Result<()> {
    // ---
    if let Some(date) = table.dates.iter().find(|d| **d > latest) {
        return Err(PipelineError::source_format(
            &table.source,
            format!(
                "{} date column {date} lies after {latest}; two-digit years are read as 20YY",
                table.metric
            ),
        ));
    }

    if let (Some(first), Some(last)) = (table.dates.iter().min(), table.dates.iter().max()) {
        tracing::debug!("{} table covers {} .. {}", table.metric, first, last);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{Metric, RawMetricRow};
    use std::path::PathBuf;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn wide_table() -> RawMetricTable {
        // ---
        RawMetricTable {
            metric: Metric::Confirmed,
            source: PathBuf::from("confirmed.csv"),
            dates: vec![date(2023, 3, 7), date(2023, 3, 8), date(2023, 3, 9)],
            rows: vec![
                RawMetricRow {
                    province: None,
                    country: "Testland".to_string(),
                    latitude: None,
                    longitude: None,
                    values: vec![90, 100, 120],
                },
                RawMetricRow {
                    province: Some("North".to_string()),
                    country: "Otherland".to_string(),
                    latitude: None,
                    longitude: None,
                    values: vec![1, 2, 3],
                },
            ],
        }
    }

    /// Pivot long rows back to wide form, keeping first-seen order.
    fn to_wide(long: &[LongMetricRow], template: &RawMetricTable) -> RawMetricTable {
        // ---
        let mut dates: Vec<NaiveDate> = Vec::new();
        let mut rows: Vec<RawMetricRow> = Vec::new();

        for row in long {
            if !dates.contains(&row.reported_on) {
                dates.push(row.reported_on);
            }
            match rows
                .iter_mut()
                .find(|r| r.country == row.country && r.province == row.province)
            {
                Some(existing) => existing.values.push(row.value),
                None => rows.push(RawMetricRow {
                    province: row.province.clone(),
                    country: row.country.clone(),
                    latitude: None,
                    longitude: None,
                    values: vec![row.value],
                }),
            }
        }

        RawMetricTable {
            metric: template.metric,
            source: template.source.clone(),
            dates,
            rows,
        }
    }

    #[test]
    fn test_reshape_emits_one_row_per_date() {
        // ---
        let long = to_long(&wide_table()).unwrap();

        assert_eq!(long.len(), 6);
        assert_eq!(
            long[1],
            LongMetricRow {
                country: "Testland".to_string(),
                province: None,
                reported_on: date(2023, 3, 8),
                value: 100,
            }
        );
        assert_eq!(long[5].province.as_deref(), Some("North"));
        assert_eq!(long[5].value, 3);
    }

    #[test]
    fn test_reshape_keys_are_unique() {
        // ---
        let long = to_long(&wide_table()).unwrap();
        let keys: HashSet<_> = long.iter().map(LongMetricRow::key).collect();

        assert_eq!(keys.len(), long.len());
    }

    #[test]
    fn test_reshape_then_pivot_recovers_wide_table() {
        // ---
        let wide = wide_table();
        let long = to_long(&wide).unwrap();

        assert_eq!(to_wide(&long, &wide), wide);
    }

    #[test]
    fn test_reshape_drops_coordinates() {
        // ---
        let mut wide = wide_table();
        wide.rows[0].latitude = Some(10.0);
        wide.rows[0].longitude = Some(20.0);

        let long = to_long(&wide).unwrap();

        // Same long rows as without coordinates
        assert_eq!(long, to_long(&wide_table()).unwrap());
    }

    #[test]
    fn test_reshape_rejects_duplicate_identifier() {
        // ---
        let mut wide = wide_table();
        let duplicate = wide.rows[0].clone();
        wide.rows.push(duplicate);

        let err = to_long(&wide).unwrap_err();

        assert!(matches!(err, PipelineError::SourceFormat { .. }));
        assert!(err.to_string().contains("Testland"));
    }

    #[test]
    fn test_validate_dates() {
        // ---
        let wide = wide_table();

        assert!(validate_dates(&wide, date(2023, 3, 9)).is_ok());
        assert!(validate_dates(&wide, date(2024, 1, 1)).is_ok());

        let err = validate_dates(&wide, date(2023, 3, 8)).unwrap_err();
        assert!(err.to_string().contains("2023-03-09"));
    }
}
