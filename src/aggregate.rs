//! Aggregator: collapses province rows into one point per country and day.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{PipelineError, Result};
use crate::models::{MergedRow, TimeSeriesPoint};

// ---

/// Sum confirmed, deaths and doses per `(country, reported_on)`.
///
/// Missing deaths or doses count as 0, so a country whose provinces lack
/// vaccine coverage still gets a point for every day. Output is ordered by
/// country, then date. A sum past `i64::MAX` is a
/// [`PipelineError::CountOverflow`].
pub fn by_country(rows: &[MergedRow]) -> Result<Vec<TimeSeriesPoint>> {
    // ---
    let mut groups: BTreeMap<(&str, NaiveDate), (i64, i64, i64)> = BTreeMap::new();

    for row in rows {
        let sums = groups
            .entry((row.country.as_str(), row.reported_on))
            .or_default();
        sums.0 = add_count(sums.0, row.confirmed, "confirmed", row)?;
        sums.1 = add_count(sums.1, row.deaths.unwrap_or(0), "deaths", row)?;
        sums.2 = add_count(
            sums.2,
            row.doses_administered.unwrap_or(0),
            "doses_administered",
            row,
        )?;
    }

    let points: Vec<TimeSeriesPoint> = groups
        .into_iter()
        .map(
            |((country, reported_on), (confirmed, deaths, doses_administered))| TimeSeriesPoint {
                country: country.to_string(),
                reported_on,
                confirmed,
                deaths,
                doses_administered,
            },
        )
        .collect();

    tracing::debug!(
        "Aggregated {} merged rows into {} country points",
        rows.len(),
        points.len()
    );
    Ok(points)
}

fn add_count(sum: i64, value: i64, metric: &'static str, row: &MergedRow) -> Result<i64> {
    // ---
    sum.checked_add(value)
        .ok_or_else(|| PipelineError::CountOverflow {
            metric,
            country: row.country.clone(),
            reported_on: row.reported_on,
        })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::HashSet;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 5, d).unwrap()
    }

    fn merged(
        country: &str,
        province: Option<&str>,
        day: u32,
        confirmed: i64,
        deaths: Option<i64>,
        doses: Option<i64>,
    ) -> MergedRow {
        MergedRow {
            country: country.to_string(),
            province: province.map(str::to_string),
            reported_on: date(day),
            confirmed,
            deaths,
            doses_administered: doses,
        }
    }

    fn sample_rows() -> Vec<MergedRow> {
        vec![
            merged("Canada", Some("Ontario"), 1, 100, Some(5), Some(1000)),
            merged("Canada", Some("Quebec"), 1, 80, Some(3), None),
            merged("Canada", None, 1, 0, None, Some(500)),
            merged("Canada", Some("Ontario"), 2, 110, Some(6), Some(1200)),
            merged("Canada", Some("Quebec"), 2, 90, Some(4), None),
            merged("Brazil", None, 2, 300, Some(20), None),
        ]
    }

    #[test]
    fn test_sums_provinces_per_day() {
        // ---
        let points = by_country(&sample_rows()).unwrap();

        assert_eq!(
            points,
            vec![
                TimeSeriesPoint {
                    country: "Brazil".to_string(),
                    reported_on: date(2),
                    confirmed: 300,
                    deaths: 20,
                    doses_administered: 0,
                },
                TimeSeriesPoint {
                    country: "Canada".to_string(),
                    reported_on: date(1),
                    confirmed: 180,
                    deaths: 8,
                    doses_administered: 1500,
                },
                TimeSeriesPoint {
                    country: "Canada".to_string(),
                    reported_on: date(2),
                    confirmed: 200,
                    deaths: 10,
                    doses_administered: 1200,
                },
            ]
        );
    }

    #[test]
    fn test_points_unique_per_country_and_day() {
        // ---
        let points = by_country(&sample_rows()).unwrap();
        let keys: HashSet<_> = points
            .iter()
            .map(|p| (p.country.clone(), p.reported_on))
            .collect();

        assert_eq!(keys.len(), points.len());
    }

    #[test]
    fn test_aggregation_preserves_sums() {
        // ---
        let rows = sample_rows();
        let points = by_country(&rows).unwrap();

        for country in ["Canada", "Brazil"] {
            let before: i64 = rows
                .iter()
                .filter(|r| r.country == country)
                .map(|r| r.confirmed)
                .sum();
            let after: i64 = points
                .iter()
                .filter(|p| p.country == country)
                .map(|p| p.confirmed)
                .sum();
            assert_eq!(before, after, "confirmed sum changed for {country}");
        }
    }

    #[test]
    fn test_empty_input() {
        // ---
        assert!(by_country(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_sum_past_i64_max_is_an_error() {
        // ---
        let rows = vec![
            merged("Bigland", Some("A"), 1, 5_000_000_000_000_000_000, Some(1), None),
            merged("Bigland", Some("B"), 1, 5_000_000_000_000_000_000, Some(1), None),
        ];

        match by_country(&rows) {
            Err(PipelineError::CountOverflow {
                metric,
                country,
                reported_on,
            }) => {
                assert_eq!(metric, "confirmed");
                assert_eq!(country, "Bigland");
                assert_eq!(reported_on, date(1));
            }
            other => panic!("expected CountOverflow, got {other:?}"),
        }
    }

    #[test]
    fn test_large_sums_within_range() {
        // ---
        let rows = vec![
            merged("Bigland", Some("A"), 1, i64::MAX - 1, None, None),
            merged("Bigland", Some("B"), 1, 1, None, None),
        ];

        let points = by_country(&rows).unwrap();
        assert_eq!(points[0].confirmed, i64::MAX);
    }
}
