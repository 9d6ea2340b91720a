//! Error taxonomy for the `covidflow` ETL pipeline.
//!
//! Every ingestion, merge and persistence failure surfaces as a
//! [`PipelineError`]. All variants are fatal for the current run: the
//! pipeline aborts before the replace-on-write step, so the previously
//! persisted tables stay untouched.

use std::path::PathBuf;

// ---

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    // ---
    /// A required column is missing or a cell fails type coercion.
    #[error("Source format error in {}: {reason}", .path.display())]
    SourceFormat { path: PathBuf, reason: String },

    /// The companion metric files cover different sets of countries.
    #[error("Join key mismatch between {left} and {right}: {detail}")]
    JoinKeyMismatch {
        left: &'static str,
        right: &'static str,
        detail: String,
    },

    /// The same join key occurs twice in one input table.
    #[error("Duplicate key in {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },

    /// A per-country sum does not fit in an `i64`.
    #[error("{metric} total for {country} on {reported_on} overflows")]
    CountOverflow {
        metric: &'static str,
        country: String,
        reported_on: chrono::NaiveDate,
    },

    #[error("CSV error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Pipeline worker failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    // ---
    pub fn source_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::SourceFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
