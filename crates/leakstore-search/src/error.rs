//! Search Backend Error Types
//!
//! ## Error Categories
//!
//! ### Transient
//! - `Unavailable`: the backend could not be reached (connect, timeout,
//!   TLS); retried with backoff
//! - `Backend` with a 5xx status: the backend answered but failed; also
//!   retried
//!
//! ### Permanent
//! - `Backend` with a 4xx status: the request itself is wrong
//! - `AlreadyExists`: a create hit an existing resource; callers treat this
//!   as "resume from here", never as a failure to report
//! - `InvalidResponse`: the backend answered 2xx but the body did not parse
//! - `Config`: bad client configuration, failed before any request

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search backend unavailable: {0}")]
    Unavailable(String),

    #[error("Search backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SearchError {
    /// True for failures worth retrying: the backend was unreachable or
    /// answered with a server-side error.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Unavailable(_) => true,
            SearchError::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        SearchError::Unavailable(e.to_string())
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(e: serde_json::Error) -> Self {
        SearchError::InvalidResponse(e.to_string())
    }
}
