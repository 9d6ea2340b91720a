//! Aligner/Merger: joins the long confirmed, deaths and vaccine tables.
//!
//! Both joins are left joins anchored on the confirmed table and keyed on
//! [`LocationKey`]. A missing match on the right side leaves the metric
//! `None`; it is never an error. Only a divergence of the country universes
//! of the two companion metric files is fatal.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{PipelineError, Result};
use crate::models::{LocationKey, LongMetricRow, MergedRow, VaccineRow};

// ---

/// Maximum number of countries listed in a mismatch error.
const MISMATCH_SAMPLE: usize = 5;

/// Align confirmed, deaths and vaccine rows into [`MergedRow`]s, in the
/// order of the confirmed table.
pub fn merge(
    confirmed: &[LongMetricRow],
    deaths: &[LongMetricRow],
    vaccine: &[VaccineRow],
) -> Result<Vec<MergedRow>> {
    // ---
    check_country_universe(confirmed, deaths)?;
    let merged = join_deaths(confirmed, deaths)?;
    join_vaccine(merged, vaccine)
}

/// Step 1: left-join confirmed with deaths.
pub fn join_deaths(confirmed: &[LongMetricRow], deaths: &[LongMetricRow]) -> Result<Vec<MergedRow>> {
    // ---
    let deaths_by_key = index_unique("deaths", deaths.iter().map(|r| (r.key(), r.value)))?;

    let mut anchor_keys = HashSet::with_capacity(confirmed.len());
    let mut unmatched = 0usize;
    let mut merged = Vec::with_capacity(confirmed.len());

    for row in confirmed {
        let key = row.key();
        let deaths = deaths_by_key.get(&key).copied();
        if deaths.is_none() {
            unmatched += 1;
        }
        if !anchor_keys.insert(key) {
            return Err(PipelineError::DuplicateKey {
                table: "confirmed",
                key: row.key().to_string(),
            });
        }

        merged.push(MergedRow {
            country: row.country.clone(),
            province: row.province.clone(),
            reported_on: row.reported_on,
            confirmed: row.value,
            deaths,
            doses_administered: None,
        });
    }

    if unmatched > 0 {
        tracing::warn!("{} confirmed rows have no deaths record", unmatched);
    }
    let orphaned = orphaned_keys(&anchor_keys, &deaths_by_key);
    if orphaned > 0 {
        tracing::warn!("{} deaths rows have no confirmed record and are dropped", orphaned);
    }
    Ok(merged)
}

/// Step 2: left-join the step 1 result with the vaccine table.
pub fn join_vaccine(mut merged: Vec<MergedRow>, vaccine: &[VaccineRow]) -> Result<Vec<MergedRow>> {
    // ---
    let doses_by_key = index_unique(
        "vaccine",
        vaccine.iter().map(|r| (r.key(), r.doses_administered)),
    )?;

    let mut matched = 0usize;
    for row in &mut merged {
        let key = LocationKey {
            country: row.country.clone(),
            province: row.province.clone(),
            reported_on: row.reported_on,
        };
        if let Some(doses) = doses_by_key.get(&key) {
            matched += 1;
            row.doses_administered = *doses;
        }
    }

    tracing::debug!(
        "Vaccine join matched {} of {} rows ({} vaccine rows)",
        matched,
        merged.len(),
        vaccine.len()
    );
    Ok(merged)
}

/// Fail with `JoinKeyMismatch` when confirmed and deaths cover different
/// countries.
pub fn check_country_universe(confirmed: &[LongMetricRow], deaths: &[LongMetricRow]) -> Result<()> {
    // ---
    let confirmed_countries: BTreeSet<&str> = confirmed.iter().map(|r| r.country.as_str()).collect();
    let deaths_countries: BTreeSet<&str> = deaths.iter().map(|r| r.country.as_str()).collect();

    if confirmed_countries == deaths_countries {
        return Ok(());
    }

    let only_confirmed = sample(confirmed_countries.difference(&deaths_countries));
    let only_deaths = sample(deaths_countries.difference(&confirmed_countries));

    Err(PipelineError::JoinKeyMismatch {
        left: "confirmed",
        right: "deaths",
        detail: format!("only in confirmed: [{only_confirmed}]; only in deaths: [{only_deaths}]"),
    })
}

/// Number of right-side keys the left join drops.
fn orphaned_keys<V>(anchor_keys: &HashSet<LocationKey>, right: &HashMap<LocationKey, V>) -> usize {
    right.keys().filter(|key| !anchor_keys.contains(*key)).count()
}

fn index_unique<V>(
    table: &'static str,
    entries: impl Iterator<Item = (LocationKey, V)>,
) -> Result<HashMap<LocationKey, V>> {
    // ---
    let mut index = HashMap::new();
    for (key, value) in entries {
        if index.contains_key(&key) {
            return Err(PipelineError::DuplicateKey {
                table,
                key: key.to_string(),
            });
        }
        index.insert(key, value);
    }
    Ok(index)
}

fn sample<S: AsRef<str>>(countries: impl Iterator<Item = S>) -> String {
    countries
        .take(MISMATCH_SAMPLE)
        .map(|c| c.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn long(country: &str, province: Option<&str>, day: u32, value: i64) -> LongMetricRow {
        LongMetricRow {
            country: country.to_string(),
            province: province.map(str::to_string),
            reported_on: date(2021, 5, day),
            value,
        }
    }

    fn vaccine(country: &str, province: Option<&str>, day: u32, doses: Option<i64>) -> VaccineRow {
        VaccineRow {
            country: country.to_string(),
            province: province.map(str::to_string),
            reported_on: date(2021, 5, day),
            doses_administered: doses,
        }
    }

    #[test]
    fn test_merge_aligns_all_three_tables() {
        // ---
        let confirmed = vec![long("Canada", Some("Ontario"), 1, 100), long("Canada", None, 1, 50)];
        let deaths = vec![long("Canada", None, 1, 2), long("Canada", Some("Ontario"), 1, 7)];
        let vaccines = vec![vaccine("Canada", Some("Ontario"), 1, Some(1000))];

        let merged = merge(&confirmed, &deaths, &vaccines).unwrap();

        assert_eq!(
            merged,
            vec![
                MergedRow {
                    country: "Canada".to_string(),
                    province: Some("Ontario".to_string()),
                    reported_on: date(2021, 5, 1),
                    confirmed: 100,
                    deaths: Some(7),
                    doses_administered: Some(1000),
                },
                MergedRow {
                    country: "Canada".to_string(),
                    province: None,
                    reported_on: date(2021, 5, 1),
                    confirmed: 50,
                    deaths: Some(2),
                    doses_administered: None,
                },
            ]
        );
    }

    #[test]
    fn test_missing_deaths_row_is_null() {
        // ---
        let confirmed = vec![long("Chile", None, 1, 10), long("Chile", None, 2, 12)];
        let deaths = vec![long("Chile", None, 1, 1)];

        let merged = join_deaths(&confirmed, &deaths).unwrap();

        assert_eq!(merged[0].deaths, Some(1));
        assert_eq!(merged[1].deaths, None);
    }

    #[test]
    fn test_deaths_without_confirmed_are_dropped_and_counted() {
        // ---
        let confirmed = vec![long("Chile", None, 1, 10)];
        let deaths = vec![
            long("Chile", None, 1, 1),
            long("Chile", None, 2, 2),
            long("Chile", Some("Santiago"), 1, 3),
        ];

        let merged = join_deaths(&confirmed, &deaths).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].deaths, Some(1));

        let anchor_keys: HashSet<LocationKey> = confirmed.iter().map(|r| r.key()).collect();
        let deaths_by_key = index_unique("deaths", deaths.iter().map(|r| (r.key(), r.value))).unwrap();
        assert_eq!(orphaned_keys(&anchor_keys, &deaths_by_key), 2);
    }

    #[test]
    fn test_unmatched_vaccine_rows_are_ignored() {
        // ---
        let confirmed = vec![long("Chile", None, 1, 10)];
        let deaths = vec![long("Chile", None, 1, 1)];
        let vaccines = vec![
            vaccine("Chile", None, 2, Some(5)),
            vaccine("Peru", None, 1, Some(9)),
        ];

        let merged = merge(&confirmed, &deaths, &vaccines).unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].doses_administered, None);
    }

    #[test]
    fn test_vaccine_blank_doses_stay_null() {
        // ---
        let confirmed = vec![long("Chile", None, 1, 10)];
        let deaths = vec![long("Chile", None, 1, 1)];
        let vaccines = vec![vaccine("Chile", None, 1, None)];

        let merged = merge(&confirmed, &deaths, &vaccines).unwrap();
        assert_eq!(merged[0].doses_administered, None);
    }

    #[test]
    fn test_country_universe_mismatch() {
        // ---
        let confirmed = vec![long("Chile", None, 1, 10), long("Peru", None, 1, 4)];
        let deaths = vec![long("Chile", None, 1, 1), long("Bolivia", None, 1, 0)];

        let err = merge(&confirmed, &deaths, &[]).unwrap_err();

        assert!(matches!(err, PipelineError::JoinKeyMismatch { .. }));
        let message = err.to_string();
        assert!(message.contains("only in confirmed: [Peru]"));
        assert!(message.contains("only in deaths: [Bolivia]"));
    }

    #[test]
    fn test_duplicate_vaccine_key() {
        // ---
        let confirmed = vec![long("Chile", None, 1, 10)];
        let deaths = vec![long("Chile", None, 1, 1)];
        let vaccines = vec![
            vaccine("Chile", None, 1, Some(5)),
            vaccine("Chile", None, 1, Some(6)),
        ];

        let err = merge(&confirmed, &deaths, &vaccines).unwrap_err();

        assert!(matches!(err, PipelineError::DuplicateKey { table: "vaccine", .. }));
    }

    #[test]
    fn test_merged_keys_are_unique() {
        // ---
        let confirmed = vec![long("Chile", None, 1, 10), long("Chile", None, 1, 11)];
        let deaths = vec![long("Chile", None, 1, 1)];

        let err = join_deaths(&confirmed, &deaths).unwrap_err();

        assert!(matches!(err, PipelineError::DuplicateKey { table: "confirmed", .. }));
    }
}
