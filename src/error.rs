//! Error types for the archiver.
//!
//! Retrieval strategies, the listing provider and the album-host client all
//! return [`Error`]. Only [`Error::Config`] is fatal to a run; every other
//! variant is caught and logged at the item or listing level.

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration (credentials, config file)
    #[error("configuration error: {0}")]
    Config(String),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http {
        /// Requested URL
        url: String,
        /// Status code returned by the server
        status: u16,
    },

    /// Transport-level failure (DNS, connect, timeout, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML config parse error
    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// URL could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A payload the strategy needs is absent from the submission and its
    /// crosspost parent
    #[error("missing payload: {0}")]
    MissingPayload(String),

    /// Every short-video fallback was exhausted without finding a media URL
    #[error("no video source found for {0}")]
    NoVideoSource(String),

    /// External tool (extractor, multiplexer) failed or is unavailable
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Listing endpoint returned something unusable
    #[error("listing error: {0}")]
    Listing(String),
}

impl Error {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http { status, .. } => *status == 429 || *status >= 500,
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
