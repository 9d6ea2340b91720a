//! Source Reader: parses the raw CSV inputs into typed in-memory tables.
//!
//! No transformation happens here beyond type coercion and mapping the
//! source identifier columns onto the canonical `(country, province)` pair.
//! A missing required column or a cell that fails coercion is reported as
//! [`PipelineError::SourceFormat`] naming the file, line and column.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::{PipelineError, Result};
use crate::models::{DailyReportRow, Metric, RawMetricRow, RawMetricTable, VaccineRow};

// ---

/// Identifier columns of the wide confirmed/deaths tables.
const METRIC_PROVINCE: &str = "Province/State";
const METRIC_COUNTRY: &str = "Country/Region";
const METRIC_LAT: &str = "Lat";
const METRIC_LONG: &str = "Long";

/// Vaccine table columns. `UID` and `People_at_least_one_dose` are dropped.
const VACCINE_PROVINCE: &str = "Province_State";
const VACCINE_COUNTRY: &str = "Country_Region";
const VACCINE_DATE: &str = "Date";
const VACCINE_DOSES: &str = "Doses_admin";

/// Snapshot (daily report) columns.
const SNAPSHOT_COUNTRY: &str = "Country_Region";
const SNAPSHOT_PROVINCE: &str = "Province_State";
const SNAPSHOT_COUNTY: &str = "Admin2";
const SNAPSHOT_CONFIRMED: &str = "Confirmed";
const SNAPSHOT_DEATHS: &str = "Deaths";
const SNAPSHOT_LAT: &str = "Lat";
const SNAPSHOT_LONG: &str = "Long_";

/// Two-digit years in metric headers are read as 20YY.
const METRIC_DATE_CENTURY: i32 = 2000;

/// Read a wide cumulative metric table (confirmed or deaths).
///
/// The four identifier columns are located by name; every other column is
/// a `MM/DD/YY` date header whose cells hold the cumulative count.
pub fn read_metric_table(path: &Path, metric: Metric) -> Result<RawMetricTable> {
    // ---
    let mut reader = open(path)?;
    let headers = headers(&mut reader, path)?;

    let province_idx = column_index(&headers, METRIC_PROVINCE, path)?;
    let country_idx = column_index(&headers, METRIC_COUNTRY, path)?;
    let lat_idx = column_index(&headers, METRIC_LAT, path)?;
    let long_idx = column_index(&headers, METRIC_LONG, path)?;
    let identifiers = [province_idx, country_idx, lat_idx, long_idx];

    let mut date_columns = Vec::new();
    for (idx, name) in headers.iter().enumerate() {
        if identifiers.contains(&idx) {
            continue;
        }
        let date = parse_metric_date(name).ok_or_else(|| {
            PipelineError::source_format(
                path,
                format!("column '{name}' is neither an identifier nor a MM/DD/YY date"),
            )
        })?;
        date_columns.push((idx, date));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| csv_error(path, source))?;
        let line = line_of(&record);

        let country = required_text(&record, country_idx, METRIC_COUNTRY, path, line)?;
        let values = date_columns
            .iter()
            .map(|(idx, date)| {
                let cell = record.get(*idx).unwrap_or("");
                parse_count(cell).ok_or_else(|| {
                    invalid_cell(path, line, &date.to_string(), cell, "a non-negative integer")
                })
            })
            .collect::<Result<Vec<_>>>()?;

        rows.push(RawMetricRow {
            province: optional_text(&record, province_idx),
            country,
            latitude: optional_coordinate(&record, lat_idx, METRIC_LAT, path, line)?,
            longitude: optional_coordinate(&record, long_idx, METRIC_LONG, path, line)?,
            values,
        });
    }

    tracing::debug!(
        "Read {} table {}: {} locations x {} dates",
        metric,
        path.display(),
        rows.len(),
        date_columns.len()
    );

    Ok(RawMetricTable {
        metric,
        source: path.to_path_buf(),
        dates: date_columns.into_iter().map(|(_, date)| date).collect(),
        rows,
    })
}

/// Read the row-per-date vaccine table, renaming its identifiers to the
/// canonical `(country, province)` pair.
pub fn read_vaccine_table(path: &Path) -> Result<Vec<VaccineRow>> {
    // ---
    let mut reader = open(path)?;
    let headers = headers(&mut reader, path)?;

    let province_idx = column_index(&headers, VACCINE_PROVINCE, path)?;
    let country_idx = column_index(&headers, VACCINE_COUNTRY, path)?;
    let date_idx = column_index(&headers, VACCINE_DATE, path)?;
    let doses_idx = column_index(&headers, VACCINE_DOSES, path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| csv_error(path, source))?;
        let line = line_of(&record);

        let date_cell = record.get(date_idx).unwrap_or("");
        let reported_on = NaiveDate::parse_from_str(date_cell, "%Y-%m-%d")
            .map_err(|_| invalid_cell(path, line, VACCINE_DATE, date_cell, "a YYYY-MM-DD date"))?;

        let doses_cell = record.get(doses_idx).unwrap_or("");
        let doses_administered = if doses_cell.is_empty() {
            None
        } else {
            Some(parse_count(doses_cell).ok_or_else(|| {
                invalid_cell(path, line, VACCINE_DOSES, doses_cell, "a non-negative integer")
            })?)
        };

        rows.push(VaccineRow {
            country: required_text(&record, country_idx, VACCINE_COUNTRY, path, line)?,
            province: optional_text(&record, province_idx),
            reported_on,
            doses_administered,
        });
    }

    tracing::debug!("Read vaccine table {}: {} rows", path.display(), rows.len());
    Ok(rows)
}

/// Read the single-date snapshot file into `daily_report` rows, keeping
/// source order.
pub fn read_daily_report(path: &Path) -> Result<Vec<DailyReportRow>> {
    // ---
    let mut reader = open(path)?;
    let headers = headers(&mut reader, path)?;

    let country_idx = column_index(&headers, SNAPSHOT_COUNTRY, path)?;
    let province_idx = column_index(&headers, SNAPSHOT_PROVINCE, path)?;
    let county_idx = column_index(&headers, SNAPSHOT_COUNTY, path)?;
    let confirmed_idx = column_index(&headers, SNAPSHOT_CONFIRMED, path)?;
    let deaths_idx = column_index(&headers, SNAPSHOT_DEATHS, path)?;
    let lat_idx = column_index(&headers, SNAPSHOT_LAT, path)?;
    let long_idx = column_index(&headers, SNAPSHOT_LONG, path)?;

    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| csv_error(path, source))?;
        let line = line_of(&record);

        let row = DailyReportRow {
            country: required_text(&record, country_idx, SNAPSHOT_COUNTRY, path, line)?,
            province: optional_text(&record, province_idx),
            county: optional_text(&record, county_idx),
            confirmed: count_or_zero(&record, confirmed_idx, SNAPSHOT_CONFIRMED, path, line)?,
            deaths: count_or_zero(&record, deaths_idx, SNAPSHOT_DEATHS, path, line)?,
            latitude: optional_coordinate(&record, lat_idx, SNAPSHOT_LAT, path, line)?,
            longitude: optional_coordinate(&record, long_idx, SNAPSHOT_LONG, path, line)?,
        };

        let location = (row.country.clone(), row.province.clone(), row.county.clone());
        if !seen.insert(location) {
            return Err(PipelineError::source_format(
                path,
                format!(
                    "line {line}: location {:?}/{:?}/{:?} appears more than once",
                    row.country, row.province, row.county
                ),
            ));
        }
        rows.push(row);
    }

    tracing::debug!("Read snapshot {}: {} locations", path.display(), rows.len());
    Ok(rows)
}

// ---

/// Parse a `MM/DD/YY` metric header, resolving the century as 20YY.
pub fn parse_metric_date(header: &str) -> Option<NaiveDate> {
    // ---
    let mut parts = header.trim().split('/');
    let month = parts.next()?.parse::<u32>().ok()?;
    let day = parts.next()?.parse::<u32>().ok()?;
    let year = parts.next()?;
    if parts.next().is_some() || year.len() != 2 {
        return None;
    }
    let year = year.parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(METRIC_DATE_CENTURY + year, month, day)
}

/// Parse a cumulative count. Integral floats such as `123.0` are accepted
/// since some republished files carry them.
fn parse_count(cell: &str) -> Option<i64> {
    // ---
    let value = match cell.parse::<i64>() {
        Ok(value) => value,
        Err(_) => {
            let float = cell.parse::<f64>().ok()?;
            if !float.is_finite() || float.fract() != 0.0 || float.abs() > i64::MAX as f64 {
                return None;
            }
            float as i64
        }
    };
    (value >= 0).then_some(value)
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|source| csv_error(path, source))
}

fn headers(reader: &mut csv::Reader<std::fs::File>, path: &Path) -> Result<StringRecord> {
    reader
        .headers()
        .cloned()
        .map_err(|source| csv_error(path, source))
}

fn column_index(headers: &StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| PipelineError::source_format(path, format!("missing required column '{name}'")))
}

fn csv_error(path: &Path, source: csv::Error) -> PipelineError {
    PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

fn invalid_cell(path: &Path, line: u64, column: &str, cell: &str, expected: &str) -> PipelineError {
    PipelineError::source_format(
        path,
        format!("line {line}, column '{column}': expected {expected}, got '{cell}'"),
    )
}

fn optional_text(record: &StringRecord, idx: usize) -> Option<String> {
    record
        .get(idx)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
}

fn required_text(
    record: &StringRecord,
    idx: usize,
    column: &str,
    path: &Path,
    line: u64,
) -> Result<String> {
    optional_text(record, idx)
        .ok_or_else(|| invalid_cell(path, line, column, "", "a non-empty value"))
}

fn optional_coordinate(
    record: &StringRecord,
    idx: usize,
    column: &str,
    path: &Path,
    line: u64,
) -> Result<Option<f64>> {
    match record.get(idx).unwrap_or("") {
        "" => Ok(None),
        cell => cell
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid_cell(path, line, column, cell, "a decimal coordinate")),
    }
}

fn count_or_zero(
    record: &StringRecord,
    idx: usize,
    column: &str,
    path: &Path,
    line: u64,
) -> Result<i64> {
    match record.get(idx).unwrap_or("") {
        "" => Ok(0),
        cell => parse_count(cell)
            .ok_or_else(|| invalid_cell(path, line, column, cell, "a non-negative integer")),
    }
}
