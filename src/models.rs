//! Data models for each stage of the COVID-19 pipeline.
//!
//! Tables flow Source Reader → Reshaper → Merger → Aggregator → Store, and
//! each stage has its own row type here. Counts are `i64` because that is
//! what SQLite stores; the Source Reader guarantees they are non-negative.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---

/// Which cumulative metric a wide source table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    // ---
    Confirmed,
    Deaths,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Confirmed => "confirmed",
            Metric::Deaths => "deaths",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One identifier row of a wide metric table.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMetricRow {
    // ---
    pub province: Option<String>,
    pub country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// One cumulative value per entry of [`RawMetricTable::dates`].
    pub values: Vec<i64>,
}

/// Wide cumulative time series: one row per location, one column per date.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMetricTable {
    // ---
    pub metric: Metric,
    /// File the table was read from, for error reporting.
    pub source: PathBuf,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<RawMetricRow>,
}

/// Join key shared by every long-form table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    // ---
    pub country: String,
    pub province: Option<String>,
    pub reported_on: NaiveDate,
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.province {
            Some(province) => write!(f, "{}/{} @ {}", self.country, province, self.reported_on),
            None => write!(f, "{} @ {}", self.country, self.reported_on),
        }
    }
}

/// Long form of a metric table: one row per (location, date).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongMetricRow {
    // ---
    pub country: String,
    pub province: Option<String>,
    pub reported_on: NaiveDate,
    pub value: i64,
}

impl LongMetricRow {
    pub fn key(&self) -> LocationKey {
        LocationKey {
            country: self.country.clone(),
            province: self.province.clone(),
            reported_on: self.reported_on,
        }
    }
}

/// Vaccine source row, identifiers already renamed to the canonical ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaccineRow {
    // ---
    pub country: String,
    pub province: Option<String>,
    pub reported_on: NaiveDate,
    pub doses_administered: Option<i64>,
}

impl VaccineRow {
    pub fn key(&self) -> LocationKey {
        LocationKey {
            country: self.country.clone(),
            province: self.province.clone(),
            reported_on: self.reported_on,
        }
    }
}

/// Confirmed, deaths and doses aligned on one [`LocationKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRow {
    // ---
    pub country: String,
    pub province: Option<String>,
    pub reported_on: NaiveDate,
    pub confirmed: i64,
    pub deaths: Option<i64>,
    pub doses_administered: Option<i64>,
}

/// Persisted per-country daily history (table `time_series`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimeSeriesPoint {
    // ---
    pub country: String,
    pub reported_on: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
    pub doses_administered: i64,
}

/// Persisted latest snapshot per location (table `daily_report`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyReportRow {
    // ---
    pub country: String,
    pub province: Option<String>,
    pub county: Option<String>,
    pub confirmed: i64,
    pub deaths: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
