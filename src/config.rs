//! Configuration loader for the `covidflow` pipeline and query service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional value of any `FromStr` type with a default value.
macro_rules! parse_env_or {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

const DEFAULT_CONFIRMED_FILE: &str = "time_series_covid19_confirmed_global.csv";
const DEFAULT_DEATHS_FILE: &str = "time_series_covid19_deaths_global.csv";
const DEFAULT_VACCINE_FILE: &str = "time_series_covid19_vaccine_global.csv";
const DEFAULT_SNAPSHOT_FILE: &str = "03-09-2023.csv";

/// What the binary does after startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    // ---
    /// Run the pipeline once and exit.
    Ingest,
    /// Serve queries over whatever the store currently holds.
    Serve,
    /// Run the pipeline, then serve.
    All,
}

impl RunMode {
    pub fn ingests(self) -> bool {
        matches!(self, RunMode::Ingest | RunMode::All)
    }

    pub fn serves(self) -> bool {
        matches!(self, RunMode::Serve | RunMode::All)
    }
}

impl FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ingest" => Ok(RunMode::Ingest),
            "serve" => Ok(RunMode::Serve),
            "all" => Ok(RunMode::All),
            other => bail!("expected ingest, serve or all, got '{}'", other),
        }
    }
}

/// Locations of the four pipeline inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFiles {
    // ---
    pub confirmed: PathBuf,
    pub deaths: PathBuf,
    pub vaccine: PathBuf,
    pub snapshot: PathBuf,
}

impl SourceFiles {
    /// Build the four paths under `data_dir`.
    pub fn in_dir(
        data_dir: impl Into<PathBuf>,
        confirmed: &str,
        deaths: &str,
        vaccine: &str,
        snapshot: &str,
    ) -> Self {
        let data_dir = data_dir.into();
        SourceFiles {
            confirmed: data_dir.join(confirmed),
            deaths: data_dir.join(deaths),
            vaccine: data_dir.join(vaccine),
            snapshot: data_dir.join(snapshot),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        [&self.confirmed, &self.deaths, &self.vaccine, &self.snapshot].into_iter()
    }
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// SQLite connection string, e.g. `sqlite://data/covid_19.db`.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Pipeline input files.
    pub sources: SourceFiles,

    /// When set, the source files are downloaded from here before each run.
    pub source_base_url: Option<String>,

    /// Ingest, serve, or both.
    pub run_mode: RunMode,

    /// Date used for the headline doses total.
    pub latest_report_date: NaiveDate,

    /// Default number of countries preselected on the map.
    pub top_n: u32,

    /// Minimum rendered map marker size.
    pub marker_size_min: f64,

    /// HTTP port of the query service.
    pub listen_port: u16,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – SQLite connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `DATA_DIR` – directory holding the source files (default: `data`)
/// - `CONFIRMED_FILE`, `DEATHS_FILE`, `VACCINE_FILE`, `SNAPSHOT_FILE` –
///   source file names inside `DATA_DIR`
/// - `SOURCE_BASE_URL` – download the source files from here first
/// - `RUN_MODE` – `ingest`, `serve` or `all` (default: `all`)
/// - `LATEST_REPORT_DATE` – headline doses date (default: 2023-03-09)
/// - `TOP_N` – default map preselection size (default: 30)
/// - `MARKER_SIZE_MIN` – minimum marker size (default: 2)
/// - `LISTEN_PORT` – HTTP port (default: 8080)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);

    let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let file = |var: &str, default: &str| env::var(var).unwrap_or_else(|_| default.to_string());
    let sources = SourceFiles::in_dir(
        data_dir,
        &file("CONFIRMED_FILE", DEFAULT_CONFIRMED_FILE),
        &file("DEATHS_FILE", DEFAULT_DEATHS_FILE),
        &file("VACCINE_FILE", DEFAULT_VACCINE_FILE),
        &file("SNAPSHOT_FILE", DEFAULT_SNAPSHOT_FILE),
    );

    let source_base_url = env::var("SOURCE_BASE_URL")
        .ok()
        .filter(|url| !url.is_empty());
    let run_mode = parse_env_or!("RUN_MODE", RunMode, RunMode::All);
    let latest_report_date = parse_env_or!(
        "LATEST_REPORT_DATE",
        NaiveDate,
        NaiveDate::from_ymd_opt(2023, 3, 9).ok_or_else(|| anyhow!("invalid default date"))?
    );
    let top_n = parse_env_u32!("TOP_N", 30);
    let marker_size_min = parse_env_or!("MARKER_SIZE_MIN", f64, 2.0);
    let listen_port = parse_env_or!("LISTEN_PORT", u16, 8080);

    Ok(Config {
        db_url,
        db_pool_max,
        sources,
        source_base_url,
        run_mode,
        latest_report_date,
        top_n,
        marker_size_min,
        listen_port,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL       : {}", self.db_url);
        tracing::info!("  DB_POOL_MAX        : {}", self.db_pool_max);
        tracing::info!("  CONFIRMED_FILE     : {}", self.sources.confirmed.display());
        tracing::info!("  DEATHS_FILE        : {}", self.sources.deaths.display());
        tracing::info!("  VACCINE_FILE       : {}", self.sources.vaccine.display());
        tracing::info!("  SNAPSHOT_FILE      : {}", self.sources.snapshot.display());
        tracing::info!(
            "  SOURCE_BASE_URL    : {}",
            self.source_base_url.as_deref().unwrap_or("(local files)")
        );
        tracing::info!("  RUN_MODE           : {:?}", self.run_mode);
        tracing::info!("  LATEST_REPORT_DATE : {}", self.latest_report_date);
        tracing::info!("  TOP_N              : {}", self.top_n);
        tracing::info!("  MARKER_SIZE_MIN    : {}", self.marker_size_min);
        tracing::info!("  LISTEN_PORT        : {}", self.listen_port);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_run_mode_parsing() {
        // ---
        assert_eq!("ingest".parse::<RunMode>().unwrap(), RunMode::Ingest);
        assert_eq!("serve".parse::<RunMode>().unwrap(), RunMode::Serve);
        assert_eq!("all".parse::<RunMode>().unwrap(), RunMode::All);
        assert!("both".parse::<RunMode>().is_err());

        assert!(RunMode::All.ingests() && RunMode::All.serves());
        assert!(!RunMode::Serve.ingests());
        assert!(!RunMode::Ingest.serves());
    }

    #[test]
    fn test_source_files_in_dir() {
        // ---
        let sources = SourceFiles::in_dir("data", "c.csv", "d.csv", "v.csv", "s.csv");

        assert_eq!(sources.confirmed, PathBuf::from("data/c.csv"));
        assert_eq!(sources.snapshot, PathBuf::from("data/s.csv"));
        assert_eq!(sources.iter().count(), 4);
    }
}
