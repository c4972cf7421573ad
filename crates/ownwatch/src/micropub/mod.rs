//! Micropub: the destination side of the mirror.
//!
//! - [`translate`] - history record → [`WatchEvent`] → microformats2 body
//! - [`client`] - [`MicropubClient`], the [`Publisher`] used in production

pub mod client;
pub mod error;
pub mod translate;

pub use client::{DEFAULT_PUBLISH_TIMEOUT, MicropubClient, Publisher};
pub use error::{PublishError, UnsupportedRecordKind};
pub use translate::{Citation, MediaReference, TRAKT_WEB_URL, WatchEvent, translate};
