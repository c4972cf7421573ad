//! Error types for history fetches.

use thiserror::Error;

use crate::auth::CredentialError;

/// Why a page of history could not be fetched.
///
/// Every variant aborts the current run; the watermark is untouched, so the
/// next run retries from the same boundary.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No usable credential for the history API.
    #[error("no history API credential: {0}")]
    Credentials(#[from] CredentialError),

    /// The request never produced a response (connection, DNS, timeout).
    #[error("history request failed: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("history API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Still rate limited after exhausting retries.
    #[error("history API rate limit exceeded")]
    RateLimited,

    /// A pagination header was not present.
    #[error("missing pagination header {0}")]
    MissingPagination(&'static str),

    /// A pagination header was present but not an integer.
    #[error("invalid pagination header {header}: {value:?}")]
    InvalidPagination { header: &'static str, value: String },

    /// The body was not a list of history records.
    #[error("could not decode history page: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request URL could not be built.
    #[error("invalid history URL: {0}")]
    Url(#[from] url::ParseError),
}

impl FetchError {
    /// Whether waiting and retrying the same request may succeed.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited | FetchError::Status { status: 429, .. }
        )
    }
}
