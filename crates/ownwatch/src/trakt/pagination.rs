//! Out-of-band pagination metadata.
//!
//! Trakt reports the current page and the total page count in response
//! headers rather than in the body.

use super::error::FetchError;
use crate::http::{HttpHeaders, header_get};

pub const PAGE_HEADER: &str = "X-Pagination-Page";
pub const PAGE_COUNT_HEADER: &str = "X-Pagination-Page-Count";

/// Page position reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub page: u32,
    pub page_count: u32,
}

impl PageInfo {
    /// Parse both pagination headers; either one missing or non-numeric fails.
    pub fn from_headers(headers: &HttpHeaders) -> Result<Self, FetchError> {
        Ok(Self {
            page: parse_header(headers, PAGE_HEADER)?,
            page_count: parse_header(headers, PAGE_COUNT_HEADER)?,
        })
    }

    pub fn has_more_pages(&self) -> bool {
        self.page < self.page_count
    }
}

fn parse_header(headers: &HttpHeaders, name: &'static str) -> Result<u32, FetchError> {
    let raw = header_get(headers, name).ok_or(FetchError::MissingPagination(name))?;
    raw.trim()
        .parse::<u32>()
        .map_err(|_| FetchError::InvalidPagination {
            header: name,
            value: raw.to_string(),
        })
}
