//! Error types for the EDGAR sync pipeline

use chrono::DateTime;
use chrono_tz::Tz;
use reqwest::StatusCode;
use thiserror::Error;

use crate::models::Quarter;

/// Failure of a single HTTP fetch, after the retry schedule has run its course.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} for {url} after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        status: StatusCode,
        attempts: u32,
    },

    #[error("HTTP {status} for {url}")]
    Permanent { url: String, status: StatusCode },

    #[error("request for {url} failed after {attempts} attempts: {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("request for {url} could not be built: {source}")]
    Invalid {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// True when retrying the same request can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FetchError::Permanent { .. } | FetchError::Invalid { .. })
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("start quarter {start} is after end quarter {end}")]
    InvalidRange { start: Quarter, end: Quarter },

    #[error("no target forms given; pass at least one form type or group name")]
    NoTargetForms,

    #[error("no cached index for {}. Run 'edgarsync index' first", format_quarters(.0))]
    MissingIndexes(Vec<Quarter>),

    #[error("quarterly index download failed: {0}")]
    IndexFetch(FetchError),

    #[error("quarterly index archive unreadable: {0}")]
    IndexArchive(#[from] zip::result::ZipError),

    #[error("it is {eastern} in US/Eastern; bulk downloads are asked to run between 21:00 and 06:00. Pass --ignore-time-window to proceed anyway")]
    AccessWindowClosed { eastern: DateTime<Tz> },

    #[error("filing download failed: {0}")]
    ItemFetch(FetchError),

    #[error("could not parse attachment boundaries: {0}")]
    AttachmentParse(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn format_quarters(quarters: &[Quarter]) -> String {
    quarters
        .iter()
        .map(Quarter::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
