//! Query Layer: read-only questions the dashboard asks of the two tables.
//!
//! A [`Dashboard`] holds a full in-memory copy of `daily_report` and
//! `time_series`, taken once per load. Every method is a pure function of
//! that copy, so a `Dashboard` can be shared across request handlers
//! behind an `Arc` without locking. Unknown countries yield empty results.
//! Totals saturate at `i64::MAX` instead of wrapping.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DailyReportRow, TimeSeriesPoint};
use crate::store::StoreSnapshot;

// ---

/// Divisor applied to the largest confirmed count to get the marker size
/// reference for area-scaled map markers.
pub const MARKER_SIZE_NORMALIZATION: f64 = 2500.0;

/// Most specific description available for a `daily_report` location.
///
/// Serializes as a plain string for a country, a 2-element array for
/// `(country, province)` and a 3-element array for
/// `(country, province, county)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LocationLabel {
    // ---
    Country(String),
    Province(String, String),
    County(String, Option<String>, String),
}

impl LocationLabel {
    pub fn for_row(row: &DailyReportRow) -> Self {
        // ---
        match (&row.province, &row.county) {
            (province, Some(county)) => {
                LocationLabel::County(row.country.clone(), province.clone(), county.clone())
            }
            (Some(province), None) => LocationLabel::Province(row.country.clone(), province.clone()),
            (None, None) => LocationLabel::Country(row.country.clone()),
        }
    }
}

/// One map marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationMarker {
    // ---
    pub label: LocationLabel,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub confirmed: i64,
    pub deaths: i64,
}

/// Markers for a set of countries plus the parameters to size them by area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationMap {
    // ---
    pub markers: Vec<LocationMarker>,
    /// Always `"area"`: marker area, not diameter, scales with `confirmed`.
    pub size_mode: &'static str,
    /// Smallest rendered marker size, as supplied by the caller.
    pub size_min: f64,
    /// Largest `confirmed` in the set divided by
    /// [`MARKER_SIZE_NORMALIZATION`]; 0 when the set is empty.
    pub size_ref: f64,
}

/// A country's summed confirmed count, as returned by
/// [`Dashboard::top_n_by_confirmed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryTotal {
    // ---
    pub country: String,
    pub confirmed: i64,
}

/// In-memory snapshot of both persisted tables.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    // ---
    daily_report: Vec<DailyReportRow>,
    time_series: Vec<TimeSeriesPoint>,
}

impl From<StoreSnapshot> for Dashboard {
    fn from(snapshot: StoreSnapshot) -> Self {
        Dashboard::new(snapshot.daily_report, snapshot.time_series)
    }
}

impl Dashboard {
    // ---
    pub fn new(daily_report: Vec<DailyReportRow>, time_series: Vec<TimeSeriesPoint>) -> Self {
        Dashboard {
            daily_report,
            time_series,
        }
    }

    /// Sum of `confirmed` over every `daily_report` row.
    pub fn total_cases(&self) -> i64 {
        saturating_sum(self.daily_report.iter().map(|r| r.confirmed))
    }

    /// Sum of `deaths` over every `daily_report` row.
    pub fn total_deaths(&self) -> i64 {
        saturating_sum(self.daily_report.iter().map(|r| r.deaths))
    }

    /// Sum of `doses_administered` over the `time_series` rows of one day.
    pub fn total_doses_at(&self, date: NaiveDate) -> i64 {
        saturating_sum(
            self.time_series
                .iter()
                .filter(|p| p.reported_on == date)
                .map(|p| p.doses_administered),
        )
    }

    /// The `n` countries with the most confirmed cases in `daily_report`,
    /// largest first. Equal totals keep the order in which the countries
    /// first appear in the snapshot.
    pub fn top_n_by_confirmed(&self, n: usize) -> Vec<CountryTotal> {
        // ---
        let mut totals: Vec<CountryTotal> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();

        for row in &self.daily_report {
            match positions.get(row.country.as_str()) {
                Some(&idx) => {
                    totals[idx].confirmed = totals[idx].confirmed.saturating_add(row.confirmed)
                }
                None => {
                    positions.insert(row.country.as_str(), totals.len());
                    totals.push(CountryTotal {
                        country: row.country.clone(),
                        confirmed: row.confirmed,
                    });
                }
            }
        }

        // Vec::sort_by is stable
        totals.sort_by(|a, b| b.confirmed.cmp(&a.confirmed));
        totals.truncate(n);
        totals
    }

    /// Map markers for every `daily_report` row whose country is in
    /// `countries`, in snapshot order.
    pub fn filter_locations(&self, countries: &HashSet<String>, size_min: f64) -> LocationMap {
        // ---
        let markers: Vec<LocationMarker> = self
            .daily_report
            .iter()
            .filter(|row| countries.contains(&row.country))
            .map(|row| LocationMarker {
                label: LocationLabel::for_row(row),
                latitude: row.latitude,
                longitude: row.longitude,
                confirmed: row.confirmed,
                deaths: row.deaths,
            })
            .collect();

        let max_confirmed = markers.iter().map(|m| m.confirmed).max().unwrap_or(0);

        LocationMap {
            markers,
            size_mode: "area",
            size_min,
            size_ref: max_confirmed as f64 / MARKER_SIZE_NORMALIZATION,
        }
    }

    /// Daily history of one country, oldest first; empty if unknown.
    pub fn time_slice_for(&self, country: &str) -> Vec<TimeSeriesPoint> {
        // ---
        let mut slice: Vec<TimeSeriesPoint> = self
            .time_series
            .iter()
            .filter(|p| p.country == country)
            .cloned()
            .collect();
        slice.sort_by_key(|p| p.reported_on);
        slice
    }

    /// Distinct `daily_report` countries in order of first appearance.
    pub fn countries(&self) -> Vec<String> {
        distinct(self.daily_report.iter().map(|r| r.country.as_str()))
    }

    /// Distinct `time_series` countries in order of first appearance.
    pub fn time_series_countries(&self) -> Vec<String> {
        distinct(self.time_series.iter().map(|p| p.country.as_str()))
    }
}

fn distinct<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

fn saturating_sum(values: impl Iterator<Item = i64>) -> i64 {
    values.fold(0, i64::saturating_add)
}
