//! Error types for the harvester pipeline

/// Failure reported by a fetch-and-extract collaborator for a single request
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a response (connect, DNS, timeout)
    #[error("Transport error fetching {url}: {msg}")]
    Transport {
        /// Requested URL
        url: String,
        /// Underlying client message
        msg: String,
    },
    /// The source answered with a non-success status code
    #[error("Status code error fetching {url}: {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },
    /// The response body could not be read
    #[error("Body read error for {url}: {msg}")]
    Body {
        /// Requested URL
        url: String,
        /// Underlying client message
        msg: String,
    },
}

impl FetchError {
    /// True for transient failures worth another attempt.
    ///
    /// Transport and body errors are transient, as are `429` and any `5xx` status.
    /// Every other status is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } => true,
            FetchError::Body { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// All errors that can stop the harvester
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// I/O error on the fingerprint or content file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// Fatal fetch failure (strict mode)
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, HarvestError>;
