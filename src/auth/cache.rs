//! Token cache keyed by credential identity
//!
//! Entries are reused only while more than [`DEFAULT_REFRESH_BUFFER_SECS`] of
//! lifetime remains. Concurrent callers may both miss and both refresh; the
//! last insert wins.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use super::token::AuthToken;

/// Seconds of remaining lifetime below which a cached token is refreshed
pub const DEFAULT_REFRESH_BUFFER_SECS: i64 = 300;

/// Time source for expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
///
/// Test utility for deterministic expiry checks. Production caches and
/// providers default to [`SystemClock`].
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Credential identity a token was issued for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub client_id: String,
    pub tenant_id: String,
    pub url: String,
}

impl CacheKey {
    pub fn new(client_id: &str, tenant_id: &str, url: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            tenant_id: tenant_id.to_ascii_lowercase(),
            url: url.trim_end_matches('/').to_ascii_lowercase(),
        }
    }
}

pub struct TokenCache {
    entries: RwLock<HashMap<CacheKey, AuthToken>>,
    clock: Arc<dyn Clock>,
    refresh_buffer: Duration,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            refresh_buffer: Duration::seconds(DEFAULT_REFRESH_BUFFER_SECS),
        }
    }

    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Cached token for `key` if it is still outside the refresh buffer
    pub async fn get(&self, key: &CacheKey) -> Option<AuthToken> {
        let entries = self.entries.read().await;
        let token = entries.get(key)?;
        let now = self.clock.now();
        if token.is_usable_at(now, self.refresh_buffer) {
            debug!(
                "Using cached token for {} ({}s remaining)",
                key.url,
                token.remaining(now).num_seconds()
            );
            Some(token.clone())
        } else {
            debug!("Cached token for {} is inside the refresh window", key.url);
            None
        }
    }

    pub async fn insert(&self, key: CacheKey, token: AuthToken) {
        self.entries.write().await.insert(key, token);
    }

    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("refresh_buffer", &self.refresh_buffer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_on: DateTime<Utc>) -> AuthToken {
        AuthToken {
            access_token: "cached".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            expires_on,
            resource: "https://org.crm.dynamics.com".to_string(),
        }
    }

    fn key() -> CacheKey {
        CacheKey::new("client", "tenant", "https://org.crm.dynamics.com/")
    }

    #[tokio::test]
    async fn test_refresh_buffer_boundary() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let cache = TokenCache::with_clock(clock.clone());
        cache.insert(key(), token(start + Duration::seconds(3600))).await;

        clock.set(start + Duration::seconds(3000));
        assert!(cache.get(&key()).await.is_some());

        clock.set(start + Duration::seconds(3300));
        assert!(cache.get(&key()).await.is_none());

        clock.set(start + Duration::seconds(3400));
        assert!(cache.get(&key()).await.is_none());
    }

    #[tokio::test]
    async fn test_key_normalizes_url_and_tenant() {
        let cache = TokenCache::new();
        cache.insert(key(), token(Utc::now() + Duration::hours(1))).await;

        let same = CacheKey::new("client", "TENANT", "https://ORG.crm.dynamics.com");
        assert!(cache.get(&same).await.is_some());

        let other_client = CacheKey::new("other", "tenant", "https://org.crm.dynamics.com");
        assert!(cache.get(&other_client).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = TokenCache::new();
        cache.insert(key(), token(Utc::now() + Duration::hours(1))).await;
        assert!(cache.invalidate(&key()).await);
        assert!(!cache.invalidate(&key()).await);

        cache.insert(key(), token(Utc::now() + Duration::hours(1))).await;
        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));
    }

    #[test]
    fn test_default_cache_runs_on_system_time() {
        let before = Utc::now();
        let now = TokenCache::new().now();
        assert!(now >= before);
        assert!(now <= Utc::now());
    }
}
