use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::series::TimePoint;

/// Failures raised by the reconciliation core.
///
/// Every variant names the day or sample it was detected at so a failed run
/// can be traced back to the offending input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// Ground truth for a day is exactly zero, so the day's factor is undefined.
    #[error("daily total for day {day} ({date}) is zero; normalization is undefined")]
    ZeroGroundTruth { day: usize, date: NaiveDate },

    /// Ground truth for a day is negative, NaN or infinite.
    #[error("daily total for day {day} ({date}) is not a valid energy: {value}")]
    InvalidGroundTruth { day: usize, date: NaiveDate, value: f64 },

    /// A modeled sample is negative, NaN or infinite.
    #[error("modeled sample {index} at {timestamp} (day {day}) is not a valid irradiance: {value}")]
    InvalidModeledSample {
        day: usize,
        index: usize,
        timestamp: TimePoint,
        value: f64,
    },

    /// The modeled curve carries no energy for a day (sun never above the horizon).
    #[error("modeled irradiance for day {day} ({date}) integrates to zero")]
    ZeroModeledEnergy { day: usize, date: NaiveDate },

    /// Two series that must be index-aligned differ in length.
    #[error("{what}: expected {expected} samples, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Fewer daily totals than days covered by the hourly window.
    #[error("window spans {expected} days but only {supplied} daily totals were supplied")]
    MissingWindowData { expected: usize, supplied: usize },

    /// Consecutive samples are not exactly one hour apart.
    #[error("sample {index} at {current} does not follow {previous} by exactly one hour")]
    InvalidTimestampOrder {
        index: usize,
        previous: TimePoint,
        current: TimePoint,
    },

    /// The window's first date has no local midnight in the site time zone.
    #[error("{date} has no local midnight in the site time zone")]
    NoLocalMidnight { date: NaiveDate },

    /// A 24-sample day does not open at local midnight.
    #[error("sample {index} at {timestamp} should open a day at local midnight")]
    MisalignedDay { index: usize, timestamp: TimePoint },
}

/// Errors of the command-line shell around the core: configuration, input
/// files, output files and the upload endpoint.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("unknown timezone: {0}")]
    Timezone(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} line {line}: {message}")]
    Row {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("ground truth: {0}")]
    GroundTruth(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Upload(e.to_string())
    }
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io { path: path.into(), source }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        AppError::Csv { path: path.into(), source }
    }
}
