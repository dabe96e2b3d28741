use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures talking to the remote repository or app catalog.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },

    #[error("API rate limit exceeded")]
    RateLimited { reset: Option<DateTime<Utc>> },

    #[error("API error: {message}")]
    Api { message: String },
}

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }
}

/// Why a single artifact could not be turned into manifest records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unrecognized artifact shape")]
    Unrecognized,

    #[error("artifact is empty")]
    Empty,

    #[error("manifest file name `{0}` is not <depot>_<manifest>.manifest")]
    BadManifestName(String),

    #[error("encrypted blob has bad magic")]
    BadMagic,

    #[error("encrypted blob truncated: header says {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("artifact text is not valid UTF-8")]
    NotUtf8,

    #[error("no manifest records found")]
    NoRecords,
}

/// Terminal failures of a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("API quota exhausted (resets at {})", fmt_reset(.reset))]
    RateExhausted { reset: Option<DateTime<Utc>> },

    #[error("rate limited while processing {identifier}")]
    RateLimited { identifier: String },

    #[error("no candidate repository hosts {identifier}")]
    ResolutionFailure { identifier: String },

    #[error("could not list artifacts for {identifier}: {reason}")]
    ListingFailure { identifier: String, reason: String },

    #[error("all {failed} artifact downloads failed for {identifier}")]
    NothingAcquired { identifier: String, failed: usize },

    #[error("none of the {failed} artifacts for {identifier} decoded")]
    NothingDecoded { identifier: String, failed: usize },

    #[error("failed to write config for {identifier}: {source}")]
    PersistFailure {
        identifier: String,
        #[source]
        source: std::io::Error,
    },
}

fn fmt_reset(reset: &Option<DateTime<Utc>>) -> String {
    reset
        .map(|r| r.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Startup errors: configuration and environment discovery.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
