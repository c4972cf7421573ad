//! Sends watch events to a user's Micropub endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::error::PublishError;
use super::translate::WatchEvent;
use crate::auth::{Service, TokenProvider};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpError, HttpMethod, HttpRequest, HttpTransport};
use crate::user::User;

/// Destinations can be slow to process a post, so the bound is generous.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Where the sync engine sends translated events.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, user: &User, event: &WatchEvent) -> Result<(), PublishError>;
}

/// Micropub JSON client.
#[derive(Clone)]
pub struct MicropubClient {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
    timeout: Duration,
}

impl MicropubClient {
    /// Create a client backed by reqwest.
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Result<Self, HttpError> {
        let transport = ReqwestTransport::with_user_agent(concat!(
            "ownwatch/",
            env!("CARGO_PKG_VERSION")
        ))?;
        Ok(Self::new_with_transport(tokens, Arc::new(transport)))
    }

    pub fn new_with_transport(
        tokens: Arc<dyn TokenProvider>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            tokens,
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Publisher for MicropubClient {
    async fn publish(&self, user: &User, event: &WatchEvent) -> Result<(), PublishError> {
        let endpoint =
            user.publish_endpoint
                .as_deref()
                .ok_or_else(|| PublishError::MissingEndpoint {
                    user: user.profile_url.clone(),
                })?;
        let authorization = self.tokens.authorization(user, Service::Publish).await?;
        let body = serde_json::to_vec(&event.to_mf2())?;

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: endpoint.to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), authorization),
            ],
            body,
            timeout: Some(self.timeout),
        };

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        match response.status {
            201 | 202 => {
                tracing::debug!(
                    user = %user.key(),
                    record = event.source_id,
                    status = response.status,
                    location = ?response.header("location"),
                    "Published watch"
                );
                Ok(())
            }
            status => Err(PublishError::Rejected {
                status,
                body: response.body_text(),
            }),
        }
    }
}
