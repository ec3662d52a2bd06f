//! Error types for feed operations.

use thiserror::Error;

/// Errors that can occur while querying an external data source.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Source misconfigured: {0}")]
    Misconfigured(String),
}

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::ParseError(err.to_string())
        } else {
            FeedError::RequestFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl FeedError {
    /// Returns true if this error is transient and likely to succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::RequestFailed(_) | FeedError::Timeout(_) | FeedError::RateLimitExceeded => {
                true
            }
            FeedError::HttpStatus { status, .. } => *status >= 500,
            FeedError::ParseError(_) | FeedError::Misconfigured(_) => false,
        }
    }

    /// Map a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode, url: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            FeedError::RateLimitExceeded
        } else {
            FeedError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }
        }
    }
}
