//! Trakt history API: the source side of the mirror.
//!
//! - [`types`] - history records as Trakt returns them
//! - [`pagination`] - `X-Pagination-*` header parsing
//! - [`client`] - [`TraktClient`], the [`HistorySource`] used in production

pub mod client;
pub mod error;
pub mod pagination;
pub mod types;

pub use client::{
    DEFAULT_API_URL, DEFAULT_FETCH_TIMEOUT, HistoryPage, HistorySource, PAGE_SIZE, PageQuery,
    TraktClient,
};
pub use error::FetchError;
pub use pagination::PageInfo;
pub use types::{Episode, HistoryRecord, Media, MediaIds, Movie, Show};
