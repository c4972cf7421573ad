//! Credential lookup for the two remote systems.
//!
//! Token acquisition (the OAuth dances with Trakt and with the user's site)
//! lives outside this crate. Clients only ask a [`TokenProvider`] for the
//! bearer credential to attach to a request.

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::user::{AccessToken, User};

/// Which remote system a credential is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    History,
    Publish,
}

impl Service {
    pub fn as_str(self) -> &'static str {
        match self {
            Service::History => "history",
            Service::Publish => "publish",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{user} has no {} credential", .service.as_str())]
    Missing { user: String, service: Service },

    #[error("{} credential for {user} has expired", .service.as_str())]
    Expired { user: String, service: Service },
}

/// Source of authorization for outbound requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Value for the `Authorization` header, e.g. `Bearer abc`.
    async fn authorization(&self, user: &User, service: Service) -> Result<String, CredentialError>;
}

/// Reads the tokens persisted on the user record.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredCredentials;

impl StoredCredentials {
    fn token<'a>(user: &'a User, service: Service) -> Option<&'a AccessToken> {
        match service {
            Service::History => user.history_token.as_ref(),
            Service::Publish => user.publish_token.as_ref(),
        }
    }
}

#[async_trait]
impl TokenProvider for StoredCredentials {
    async fn authorization(&self, user: &User, service: Service) -> Result<String, CredentialError> {
        let token = Self::token(user, service).ok_or_else(|| CredentialError::Missing {
            user: user.profile_url.clone(),
            service,
        })?;

        if token.is_expired_at(Utc::now()) {
            return Err(CredentialError::Expired {
                user: user.profile_url.clone(),
                service,
            });
        }

        Ok(format!("{} {}", token.token_type, token.access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn stored_credentials_format_authorization_header() {
        let mut user = User::new("https://example.com/");
        user.history_token = Some(AccessToken::bearer("trakt-token"));

        let header = StoredCredentials
            .authorization(&user, Service::History)
            .await
            .expect("history credential");
        assert_eq!(header, "Bearer trakt-token");
    }

    #[tokio::test]
    async fn missing_credential_is_reported_per_service() {
        let mut user = User::new("https://example.com/");
        user.history_token = Some(AccessToken::bearer("trakt-token"));

        let err = StoredCredentials
            .authorization(&user, Service::Publish)
            .await
            .expect_err("no publish token");
        assert_eq!(
            err,
            CredentialError::Missing {
                user: "https://example.com/".into(),
                service: Service::Publish
            }
        );
        assert_eq!(err.to_string(), "https://example.com/ has no publish credential");
    }

    #[tokio::test]
    async fn expired_credential_is_rejected() {
        let mut user = User::new("https://example.com/");
        let mut token = AccessToken::bearer("old");
        token.expires_at = Some(Utc::now() - Duration::minutes(5));
        user.publish_token = Some(token);

        let err = StoredCredentials
            .authorization(&user, Service::Publish)
            .await
            .expect_err("expired");
        assert!(matches!(err, CredentialError::Expired { .. }));
    }
}
