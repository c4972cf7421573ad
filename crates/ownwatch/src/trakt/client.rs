//! Paginated reads of a user's Trakt watch history.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use url::Url;

use super::error::FetchError;
use super::pagination::PageInfo;
use super::types::HistoryRecord;
use crate::auth::{Service, TokenProvider};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpError, HttpMethod, HttpRequest, HttpTransport};
use crate::retry::{RetryConfig, with_retry};
use crate::user::User;

/// Production Trakt API.
pub const DEFAULT_API_URL: &str = "https://api.trakt.tv";

/// Records requested per page.
pub const PAGE_SIZE: u32 = 100;

/// Upper bound on a single page request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

const API_VERSION: &str = "2";

/// Which slice of the history to fetch.
///
/// At most one of `start_at` / `end_at` is set by the sync engine; `None`
/// leaves that side unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// 1-indexed page number.
    pub page: u32,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
}

/// One page of history plus the API's pagination report.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub records: Vec<HistoryRecord>,
    pub info: PageInfo,
}

impl HistoryPage {
    pub fn has_more_pages(&self) -> bool {
        self.info.has_more_pages()
    }
}

/// Where the sync engine reads history from.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_page(&self, user: &User, query: &PageQuery) -> Result<HistoryPage, FetchError>;
}

/// Trakt `GET /sync/history` client.
#[derive(Clone)]
pub struct TraktClient {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
    api_url: String,
    client_id: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl TraktClient {
    /// Create a client backed by reqwest.
    pub fn new(client_id: &str, tokens: Arc<dyn TokenProvider>) -> Result<Self, HttpError> {
        let transport = ReqwestTransport::with_user_agent(concat!(
            "ownwatch/",
            env!("CARGO_PKG_VERSION")
        ))?;
        Ok(Self::new_with_transport(client_id, tokens, Arc::new(transport)))
    }

    pub fn new_with_transport(
        client_id: &str,
        tokens: Arc<dyn TokenProvider>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            tokens,
            api_url: DEFAULT_API_URL.to_string(),
            client_id: client_id.to_string(),
            timeout: DEFAULT_FETCH_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }

    /// Point the client at another API host (trailing slashes are dropped).
    #[must_use]
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Build the request URL for `query`.
    pub fn history_url(&self, query: &PageQuery) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}/sync/history", self.api_url))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("limit", &PAGE_SIZE.to_string());
            pairs.append_pair("page", &query.page.to_string());
            if let Some(start_at) = query.start_at {
                pairs.append_pair("start_at", &format_timestamp(start_at));
            }
            if let Some(end_at) = query.end_at {
                pairs.append_pair("end_at", &format_timestamp(end_at));
            }
        }
        Ok(url)
    }

    async fn request_page(&self, authorization: &str, url: &Url) -> Result<HistoryPage, FetchError> {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("trakt-api-key".to_string(), self.client_id.clone()),
                ("trakt-api-version".to_string(), API_VERSION.to_string()),
                ("Authorization".to_string(), authorization.to_string()),
            ],
            body: Vec::new(),
            timeout: Some(self.timeout),
        };

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !(200..300).contains(&response.status) {
            return Err(FetchError::Status {
                status: response.status,
                body: response.body_text(),
            });
        }

        let info = PageInfo::from_headers(&response.headers)?;
        let records: Vec<HistoryRecord> = serde_json::from_slice(&response.body)?;

        Ok(HistoryPage { records, info })
    }
}

#[async_trait]
impl HistorySource for TraktClient {
    async fn fetch_page(&self, user: &User, query: &PageQuery) -> Result<HistoryPage, FetchError> {
        let authorization = self.tokens.authorization(user, Service::History).await?;
        let url = self.history_url(query)?;
        let label = format!("{} page {}", user.key(), query.page);

        let page = with_retry(
            || self.request_page(&authorization, &url),
            &self.retry,
            FetchError::is_rate_limited,
            &label,
        )
        .await
        .map_err(|e| if e.is_rate_limited() { FetchError::RateLimited } else { e })?;

        tracing::debug!(
            user = %user.key(),
            page = page.info.page,
            page_count = page.info.page_count,
            records = page.records.len(),
            "Fetched history page"
        );

        Ok(page)
    }
}

/// RFC 3339 in UTC, keeping sub-second precision when present.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
