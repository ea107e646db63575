use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, info, warn};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::cache::{CacheKey, Clock, SystemClock, TokenCache};
use super::claims;
use super::error::AuthError;
use super::token::AuthToken;
use crate::api::constants::headers;
use crate::api::models::Method;
use crate::api::transport::{HttpRequest, HttpTransport, ReqwestTransport};

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Token endpoint flavour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenEndpoint {
    /// `/oauth2/v2.0/token` with `scope=<origin>/.default`
    #[default]
    V2,
    /// Legacy `/oauth2/token` with `resource=<url>`
    V1,
}

impl TokenEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::V2 => "oauth2/v2.0/token",
            Self::V1 => "oauth2/token",
        }
    }
}

impl fmt::Display for TokenEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V2 => f.write_str("v2"),
            Self::V1 => f.write_str("v1"),
        }
    }
}

impl FromStr for TokenEndpoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v2" | "v2.0" => Ok(Self::V2),
            "v1" | "v1.0" => Ok(Self::V1),
            other => anyhow::bail!("Unknown token endpoint '{}': expected v1 or v2", other),
        }
    }
}

/// App registration credentials for the client-credentials grant
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(tenant_id: impl Into<String>, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn ensure_complete(&self) -> Result<()> {
        if self.tenant_id.trim().is_empty() {
            anyhow::bail!("A tenant id is required to acquire a token");
        }
        if self.client_id.trim().is_empty() {
            anyhow::bail!("A client id is required to acquire a token");
        }
        if self.client_secret.is_empty() {
            anyhow::bail!("A client secret is required to acquire a token");
        }
        Ok(())
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    resource: Option<String>,
}

/// Client-credentials token provider with an optional shared cache
pub struct TokenProvider<T: HttpTransport = ReqwestTransport> {
    transport: T,
    authority_host: String,
    endpoint: TokenEndpoint,
    cache: Option<Arc<TokenCache>>,
    clock: Arc<dyn Clock>,
    timeout: Option<Duration>,
}

impl TokenProvider<ReqwestTransport> {
    pub fn with_default_transport() -> Result<Self> {
        Ok(Self::new(ReqwestTransport::new()?))
    }
}

impl<T: HttpTransport> TokenProvider<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            endpoint: TokenEndpoint::default(),
            cache: None,
            clock: Arc::new(SystemClock),
            timeout: None,
        }
    }

    pub fn with_authority_host(mut self, authority_host: impl Into<String>) -> Self {
        self.authority_host = authority_host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: TokenEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Enable caching; expiry is computed on the cache's clock
    pub fn with_cache(mut self, cache: Arc<TokenCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Clock for uncached providers. Once a cache is set its clock wins,
    /// whichever order the builders are called in.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> TokenEndpoint {
        self.endpoint
    }

    pub fn cache(&self) -> Option<&Arc<TokenCache>> {
        self.cache.as_ref()
    }

    fn now(&self) -> DateTime<Utc> {
        match &self.cache {
            Some(cache) => cache.now(),
            None => self.clock.now(),
        }
    }

    pub fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/{}", self.authority_host, tenant_id.trim(), self.endpoint.path())
    }

    /// Token for `url`, served from the cache while it stays outside the refresh window
    pub async fn get_token(&self, credentials: &ClientCredentials, url: &str) -> Result<AuthToken> {
        let Some(cache) = &self.cache else {
            return self.acquire_token(credentials, url).await;
        };

        let url = normalize_environment_url(url)?;
        let key = CacheKey::new(&credentials.client_id, &credentials.tenant_id, url);

        if let Some(token) = cache.get(&key).await {
            return Ok(token);
        }

        let token = self.acquire_token(credentials, url).await?;
        cache.insert(key, token.clone()).await;
        Ok(token)
    }

    /// Always perform a fresh client-credentials exchange
    pub async fn acquire_token(&self, credentials: &ClientCredentials, url: &str) -> Result<AuthToken> {
        let url = normalize_environment_url(url)?;
        credentials.ensure_complete()?;

        let token_url = self.token_url(&credentials.tenant_id);
        info!("Requesting token for {} from {}", url, token_url);

        let scope;
        let target = match self.endpoint {
            TokenEndpoint::V2 => {
                scope = format!("{}/.default", scope_origin(url)?);
                ("scope", scope.as_str())
            }
            TokenEndpoint::V1 => ("resource", url),
        };
        let form = encode_form(&[
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            target,
        ]);

        let mut request = HttpRequest::new(Method::Post, token_url);
        request.headers = vec![
            (headers::CONTENT_TYPE.to_string(), headers::CONTENT_TYPE_FORM.to_string()),
            (headers::ACCEPT.to_string(), headers::CONTENT_TYPE_JSON.to_string()),
        ];
        request.body = Some(form);
        request.timeout = self.timeout;

        let response = self.transport.send(request).await.map_err(AuthError::from)?;
        debug!("Token request status: {}", response.status);

        if !response.is_success() {
            let error = AuthError::from_token_response(response.status, &response.body);
            warn!("Token request for {} failed: {}", url, error);
            return Err(error.into());
        }

        let parsed: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))
            .context("Failed to parse token response")?;

        let access_token = parsed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::MalformedResponse("no access_token in response".to_string()))?;

        let expires_in = parsed
            .expires_in
            .as_ref()
            .and_then(seconds_from_value)
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_on = i64::try_from(expires_in)
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .and_then(|lifetime| self.now().checked_add_signed(lifetime))
            .ok_or_else(|| AuthError::MalformedResponse(format!("expires_in {} is out of range", expires_in)))?;

        let resource = parsed
            .resource
            .as_deref()
            .map(|r| r.trim().trim_end_matches('/').to_string())
            .filter(|r| !r.is_empty())
            .or_else(|| claims::resource_from_access_token(&access_token))
            .unwrap_or_else(|| url.to_string());

        info!("Acquired token for {}, expires in {}s", resource, expires_in);

        Ok(AuthToken {
            access_token,
            token_type: parsed
                .token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Bearer".to_string()),
            expires_in,
            expires_on,
            resource,
        })
    }
}

impl<T: HttpTransport> fmt::Debug for TokenProvider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenProvider")
            .field("authority_host", &self.authority_host)
            .field("endpoint", &self.endpoint)
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

/// Trim whitespace and one trailing slash; an empty URL is a precondition failure
fn normalize_environment_url(url: &str) -> Result<&str> {
    let trimmed = url.trim();
    let normalized = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if normalized.is_empty() {
        anyhow::bail!("An environment URL is required to acquire a token");
    }
    Ok(normalized)
}

/// Scheme, host and port of the environment URL; `.default` scopes never carry a path
fn scope_origin(url: &str) -> Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid environment URL '{}'", url))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        anyhow::bail!("Environment URL '{}' must be an http(s) URL with a host", url);
    }
    Ok(parsed.origin().ascii_serialization())
}

/// `expires_in` arrives as a number from v2 and as a string from v1
fn seconds_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn encode_form(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::{HttpResponse, TransportError};
    use crate::auth::cache::ManualClock;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedTransport {
        status: u16,
        body: String,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(status: u16, body: &str) -> Self {
            Self {
                status,
                body: body.to_string(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpResponse {
                status: self.status,
                headers: Default::default(),
                body: self.body.clone(),
            })
        }
    }

    fn credentials() -> ClientCredentials {
        ClientCredentials::new("tenant-1", "client-1", "s3cr&t")
    }

    #[tokio::test]
    async fn test_v2_form_body_and_expiry() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let transport = ScriptedTransport::new(200, r#"{"token_type":"Bearer","expires_in":3600,"access_token":"abc"}"#);
        let provider = TokenProvider::new(transport).with_clock(clock);

        let token = provider
            .acquire_token(&credentials(), "https://org.crm.dynamics.com/")
            .await
            .unwrap();

        assert_eq!(token.access_token, "abc");
        assert_eq!(token.expires_in, 3600);
        assert_eq!(token.expires_on, start + ChronoDuration::seconds(3600));
        assert_eq!(token.resource, "https://org.crm.dynamics.com");

        let sent = provider.transport.sent();
        assert_eq!(sent[0].url, "https://login.microsoftonline.com/tenant-1/oauth2/v2.0/token");
        assert_eq!(sent[0].header("Content-Type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(
            sent[0].body.as_deref(),
            Some("grant_type=client_credentials&client_id=client-1&client_secret=s3cr%26t&scope=https%3A%2F%2Forg.crm.dynamics.com%2F.default")
        );
    }

    #[tokio::test]
    async fn test_v1_uses_resource_and_string_expiry() {
        let transport = ScriptedTransport::new(
            200,
            r#"{"token_type":"Bearer","expires_in":"1800","access_token":"abc","resource":"https://org.crm.dynamics.com/"}"#,
        );
        let provider = TokenProvider::new(transport)
            .with_endpoint(TokenEndpoint::V1)
            .with_authority_host("https://login.example.test/");

        let token = provider
            .acquire_token(&credentials(), "https://org.crm.dynamics.com")
            .await
            .unwrap();
        assert_eq!(token.expires_in, 1800);
        assert_eq!(token.resource, "https://org.crm.dynamics.com");

        let sent = provider.transport.sent();
        assert_eq!(sent[0].url, "https://login.example.test/tenant-1/oauth2/token");
        assert!(sent[0].body.as_deref().unwrap().ends_with("&resource=https%3A%2F%2Forg.crm.dynamics.com"));
    }

    #[tokio::test]
    async fn test_missing_expires_in_defaults_to_an_hour() {
        let provider = TokenProvider::new(ScriptedTransport::new(200, r#"{"access_token":"abc"}"#));
        let token = provider
            .acquire_token(&credentials(), "https://org.crm.dynamics.com")
            .await
            .unwrap();
        assert_eq!(token.expires_in, 3600);
        assert_eq!(token.token_type, "Bearer");
    }

    #[tokio::test]
    async fn test_classified_failure() {
        let body = r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret provided.","error_codes":[7000215]}"#;
        let provider = TokenProvider::new(ScriptedTransport::new(401, body));

        let err = provider
            .acquire_token(&credentials(), "https://org.crm.dynamics.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::InvalidClientSecret(_))
        ));
    }

    #[tokio::test]
    async fn test_response_without_access_token_is_malformed() {
        let provider = TokenProvider::new(ScriptedTransport::new(200, r#"{"token_type":"Bearer"}"#));
        let err = provider
            .acquire_token(&credentials(), "https://org.crm.dynamics.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_preconditions_fail_before_sending() {
        let provider = TokenProvider::new(ScriptedTransport::new(200, "{}"));

        assert!(provider.acquire_token(&credentials(), " ").await.is_err());
        let mut missing_secret = credentials();
        missing_secret.client_secret.clear();
        assert!(provider
            .acquire_token(&missing_secret, "https://org.crm.dynamics.com")
            .await
            .is_err());
        assert!(provider.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_cache_reuse_and_refresh() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let cache = Arc::new(TokenCache::with_clock(clock.clone()));
        let provider = TokenProvider::new(ScriptedTransport::new(
            200,
            r#"{"expires_in":3600,"access_token":"abc"}"#,
        ))
        .with_cache(cache);

        let url = "https://org.crm.dynamics.com";
        provider.get_token(&credentials(), url).await.unwrap();

        clock.set(start + ChronoDuration::seconds(3000));
        provider.get_token(&credentials(), url).await.unwrap();
        assert_eq!(provider.transport.sent().len(), 1);

        clock.set(start + ChronoDuration::seconds(3400));
        let refreshed = provider.get_token(&credentials(), url).await.unwrap();
        assert_eq!(provider.transport.sent().len(), 2);
        assert_eq!(refreshed.expires_on, start + ChronoDuration::seconds(3400 + 3600));
    }

    #[tokio::test]
    async fn test_out_of_range_expires_in_is_malformed() {
        let provider = TokenProvider::new(ScriptedTransport::new(
            200,
            r#"{"access_token":"abc","expires_in":"99999999999999999"}"#,
        ));
        let err = provider
            .acquire_token(&credentials(), "https://org.crm.dynamics.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::MalformedResponse(_))
        ));

        let provider = TokenProvider::new(ScriptedTransport::new(
            200,
            r#"{"access_token":"abc","expires_in":18446744073709551615}"#,
        ));
        assert!(provider
            .acquire_token(&credentials(), "https://org.crm.dynamics.com")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_cache_clock_wins_over_later_with_clock() {
        let cache_start = Utc::now();
        let cache_clock = Arc::new(ManualClock::new(cache_start));
        let other_clock = Arc::new(ManualClock::new(cache_start - ChronoDuration::days(2)));
        let provider = TokenProvider::new(ScriptedTransport::new(
            200,
            r#"{"expires_in":3600,"access_token":"abc"}"#,
        ))
        .with_cache(Arc::new(TokenCache::with_clock(cache_clock)))
        .with_clock(other_clock);

        let url = "https://org.crm.dynamics.com";
        let token = provider.get_token(&credentials(), url).await.unwrap();
        assert_eq!(token.expires_on, cache_start + ChronoDuration::seconds(3600));

        // Stored with a usable expiry, so the next call is a hit
        provider.get_token(&credentials(), url).await.unwrap();
        assert_eq!(provider.transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_v2_scope_drops_path_and_query() {
        let provider = TokenProvider::new(ScriptedTransport::new(200, r#"{"access_token":"abc"}"#));
        provider
            .acquire_token(&credentials(), "https://org.crm.dynamics.com/main.aspx?appid=1")
            .await
            .unwrap();

        let body = provider.transport.sent()[0].body.clone().unwrap();
        assert!(body.ends_with("&scope=https%3A%2F%2Forg.crm.dynamics.com%2F.default"));
    }

    #[tokio::test]
    async fn test_v2_scope_keeps_explicit_port() {
        let provider = TokenProvider::new(ScriptedTransport::new(200, r#"{"access_token":"abc"}"#));
        provider
            .acquire_token(&credentials(), "http://localhost:8080/org")
            .await
            .unwrap();

        let body = provider.transport.sent()[0].body.clone().unwrap();
        assert!(body.ends_with("&scope=http%3A%2F%2Flocalhost%3A8080%2F.default"));
    }

    #[tokio::test]
    async fn test_v2_rejects_url_without_host() {
        let provider = TokenProvider::new(ScriptedTransport::new(200, r#"{"access_token":"abc"}"#));
        assert!(provider.acquire_token(&credentials(), "org.crm.dynamics.com").await.is_err());
        assert!(provider.transport.sent().is_empty());
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("s3cr&t"));
        assert!(rendered.contains("client-1"));
    }

    #[test]
    fn test_endpoint_parsing() {
        assert_eq!("V1".parse::<TokenEndpoint>().unwrap(), TokenEndpoint::V1);
        assert_eq!("v2.0".parse::<TokenEndpoint>().unwrap(), TokenEndpoint::V2);
        assert!("v3".parse::<TokenEndpoint>().is_err());
    }
}
