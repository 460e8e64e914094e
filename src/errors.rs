//! Error types

use thiserror::Error;

/// Track table invariant violations. These are fatal: the table can no longer
/// guarantee one track per address or the retention of recorded violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("track table full ({capacity} tracks) while adding {addr:06X}")]
    TableFull { capacity: usize, addr: u32 },
}

/// Weather fetch failures, always recoverable
#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("weather response not understood: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no METAR report for station {0}")]
    NoReport(String),

    #[error("METAR report has no {0} field")]
    MissingField(&'static str),

    #[error("weather request timed out after {0} s")]
    Timeout(u64),
}

/// Notification sink failures, logged and otherwise ignored
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notify IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("notify command failed: {0}")]
    CommandFailed(String),
}

/// Top-level errors that end the process
#[derive(Error, Debug)]
pub enum SpeedwatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Track(#[from] TrackError),
}

pub type Result<T> = std::result::Result<T, SpeedwatchError>;
