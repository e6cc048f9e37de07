// src/error.rs
use chrono::NaiveDate;
use thiserror::Error;

// --- Error Types ---

/// Errors raised by the compliance calculation itself.
///
/// Only the calculation date can abort an evaluation. Attendance data quality
/// problems never surface here; they are skipped during ingestion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComplianceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid UTC offset '{0}' (expected Z, UTC or ±HH:MM)")]
    InvalidOffset(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("num_weeks ({value}) exceeds the supported maximum of {max} weeks")]
    NumWeeksTooLarge { value: u32, max: u32 },
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Attendance feed I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Attendance feed CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Attendance feed has no column named '{0}'")]
    MissingColumn(String),
}
