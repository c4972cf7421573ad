//! Users and the credentials they hold for the two remote systems.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::WatermarkState;

/// An OAuth access token as handed over by the login flow.
///
/// The crate never inspects it beyond the expiry; acquiring and refreshing
/// tokens happens elsewhere.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl AccessToken {
    /// A bearer token that never expires.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A user whose history is mirrored, keyed by their profile URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identity key, e.g. `https://example.com/`.
    pub profile_url: String,
    /// Resolved Micropub endpoint of the user's site.
    pub publish_endpoint: Option<String>,
    /// Credential for the Trakt history API.
    pub history_token: Option<AccessToken>,
    /// Credential for the Micropub endpoint.
    pub publish_token: Option<AccessToken>,
    #[serde(default)]
    pub watermark: WatermarkState,
}

impl User {
    pub fn new(profile_url: impl Into<String>) -> Self {
        Self {
            profile_url: profile_url.into(),
            publish_endpoint: None,
            history_token: None,
            publish_token: None,
            watermark: WatermarkState::default(),
        }
    }

    pub fn key(&self) -> &str {
        &self.profile_url
    }

    /// Both credentials and a publish endpoint are present.
    ///
    /// Users that are not eligible are skipped by scheduled sweeps.
    pub fn is_eligible(&self) -> bool {
        self.history_token.is_some()
            && self.publish_token.is_some()
            && self.publish_endpoint.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn debug_output_hides_secrets() {
        let mut token = AccessToken::bearer("s3cr3t");
        token.refresh_token = Some("r3fr3sh".into());
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("r3fr3sh"));
        assert!(rendered.contains("Bearer"));
    }

    #[test]
    fn token_expiry_is_inclusive() {
        let now = Utc::now();
        let mut token = AccessToken::bearer("t");
        assert!(!token.is_expired_at(now));

        token.expires_at = Some(now);
        assert!(token.is_expired_at(now));

        token.expires_at = Some(now + Duration::hours(1));
        assert!(!token.is_expired_at(now));
    }

    #[test]
    fn eligibility_needs_both_credentials_and_endpoint() {
        let mut user = User::new("https://example.com/");
        assert!(!user.is_eligible());

        user.history_token = Some(AccessToken::bearer("a"));
        user.publish_token = Some(AccessToken::bearer("b"));
        assert!(!user.is_eligible());

        user.publish_endpoint = Some("https://example.com/micropub".into());
        assert!(user.is_eligible());
    }

    #[test]
    fn token_type_defaults_to_bearer_when_absent() {
        let token: AccessToken =
            serde_json::from_value(serde_json::json!({ "access_token": "abc" })).expect("token");
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_at, None);
    }
}
