//! Error types for translation and publishing.

use thiserror::Error;

use crate::auth::CredentialError;

/// A history record whose kind cannot be published.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported history record kind: {0}")]
pub struct UnsupportedRecordKind(pub String);

/// Why one watch event was not accepted by the destination.
///
/// Publishing is never retried internally; the sync engine stops the run and
/// the next run retries from the unchanged watermark.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no publish credential: {0}")]
    Credentials(#[from] CredentialError),

    #[error("{user} has no Micropub endpoint")]
    MissingEndpoint { user: String },

    #[error("could not encode Micropub request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Micropub request failed: {0}")]
    Transport(String),

    /// Any status other than 201 Created / 202 Accepted.
    #[error("status from Micropub endpoint was {status}, body: {body}")]
    Rejected { status: u16, body: String },
}
