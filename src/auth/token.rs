use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::claims;

/// Token returned by the client-credentials exchange
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    /// Usually `Bearer`
    pub token_type: String,
    /// Lifetime in seconds as reported by the token endpoint
    pub expires_in: u64,
    pub expires_on: DateTime<Utc>,
    /// Environment URL the token was issued for, without trailing slash
    pub resource: String,
}

impl AuthToken {
    /// Wrap a pre-issued access token, reading `aud` and `exp` from its claims
    pub fn from_access_token(access_token: impl Into<String>) -> Result<Self> {
        let access_token = access_token.into();
        let resource = claims::resource_from_access_token(&access_token)
            .ok_or_else(|| anyhow::anyhow!("Access token has no Dataverse audience"))?;
        let expires_on = claims::expiry_from_access_token(&access_token)
            .ok_or_else(|| anyhow::anyhow!("Access token has no exp claim"))?;
        let expires_in = (expires_on - Utc::now()).num_seconds().max(0) as u64;

        Ok(Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            expires_on,
            resource,
        })
    }

    /// `<token_type> <access_token>`
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// True while more than `buffer` of lifetime remains at `now`
    pub fn is_usable_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        self.expires_on - now > buffer
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_on - now
    }

    /// Leading characters of the access token, for display
    pub fn preview(&self) -> String {
        let head: String = self.access_token.chars().take(12).collect();
        format!("{}...", head)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_on", &self.expires_on)
            .field("resource", &self.resource)
            .finish()
    }
}
