//! Error types

use std::path::PathBuf;

/// Failures talking to the metrics backend
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    /// Transport failure: unreachable host, timeout, TLS
    #[error("HTTP error: {0}")]
    Http(#[source] Box<reqwest::Error>),

    /// Backend answered with a non-success HTTP status
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Envelope decoded but the backend reported a failure
    #[error("backend status {status}: {error_type}: {message}")]
    Backend {
        status: String,
        error_type: String,
        message: String,
    },

    /// Body was not the expected JSON shape
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        QueryError::Http(Box::new(err))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ScoreError {
    #[error("contamination must be in (0, 1), got {0}")]
    InvalidContamination(f64),

    #[error("non-finite value {value} for feature {feature} of {entity}")]
    NonFinite {
        entity: String,
        feature: &'static str,
        value: f64,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
