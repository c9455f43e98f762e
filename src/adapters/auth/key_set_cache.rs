//! TTL-bounded key set cache and the HTTP fetcher behind it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use tokio::sync::RwLock;

use crate::domain::foundation::AuthError;
use crate::ports::{KeySetCache, KeySetFetcher};

/// Default lifetime of a fetched key set.
pub const DEFAULT_KEY_SET_TTL: Duration = Duration::from_secs(3600);

/// Default minimum spacing between forced refreshes.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

struct CachedKeySet {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Caches a key set for a fixed TTL.
///
/// Concurrent callers that find the cache stale may each fetch; the last
/// write wins. A forced `refresh` within the cooldown of the last fetch
/// returns the cached set instead of going to the network, so tokens with
/// made-up key ids cannot drive outbound fetches.
pub struct TtlKeySetCache<F: KeySetFetcher> {
    fetcher: F,
    ttl: Duration,
    refresh_cooldown: Duration,
    cached: RwLock<Option<CachedKeySet>>,
}

impl<F: KeySetFetcher> TtlKeySetCache<F> {
    pub fn new(fetcher: F, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
            cached: RwLock::new(None),
        }
    }

    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    async fn fetch_and_store(&self) -> Result<JwkSet, AuthError> {
        let keys = self.fetcher.fetch().await?;
        tracing::debug!(keys = keys.keys.len(), "refreshed verification key set");
        Ok(self.store(keys).await)
    }

    async fn store(&self, keys: JwkSet) -> JwkSet {
        let mut cached = self.cached.write().await;
        *cached = Some(CachedKeySet {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        keys
    }
}

#[async_trait]
impl<F: KeySetFetcher> KeySetCache for TtlKeySetCache<F> {
    async fn current(&self) -> Result<JwkSet, AuthError> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.keys.clone());
                }
            }
        }

        self.fetch_and_store().await
    }

    async fn refresh(&self) -> Result<JwkSet, AuthError> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.fetched_at.elapsed() < self.refresh_cooldown {
                    tracing::debug!("key set refreshed recently, serving cached copy");
                    return Ok(entry.keys.clone());
                }
            }
        }

        self.fetch_and_store().await
    }
}

/// Fetches a JWKS document over HTTP.
pub struct HttpKeySetFetcher {
    url: String,
    http_client: reqwest::Client,
}

impl HttpKeySetFetcher {
    pub fn new(url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http_client,
        }
    }
}

#[async_trait]
impl KeySetFetcher for HttpKeySetFetcher {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        tracing::debug!("Fetching JWKS from {}", self.url);

        let response = self.http_client.get(&self.url).send().await.map_err(|e| {
            tracing::error!("Failed to fetch JWKS: {}", e);
            AuthError::service_unavailable(format!("Failed to fetch JWKS: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!("JWKS endpoint returned {}", status);
            return Err(AuthError::service_unavailable(format!(
                "JWKS endpoint returned {}",
                status
            )));
        }

        response.json::<JwkSet>().await.map_err(|e| {
            tracing::error!("Failed to parse JWKS: {}", e);
            AuthError::service_unavailable(format!("Failed to parse JWKS: {}", e))
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{CountingFetcher, FailingFetcher};
    use super::*;

    fn empty_set() -> JwkSet {
        JwkSet { keys: vec![] }
    }

    #[tokio::test]
    async fn current_fetches_once_within_ttl() {
        let fetcher = CountingFetcher::new(empty_set());
        let cache = TtlKeySetCache::new(fetcher.clone(), Duration::from_secs(60));

        cache.current().await.unwrap();
        cache.current().await.unwrap();

        assert_eq!(fetcher.count(), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let fetcher = CountingFetcher::new(empty_set());
        let cache = TtlKeySetCache::new(fetcher.clone(), Duration::ZERO);

        cache.current().await.unwrap();
        cache.current().await.unwrap();

        assert_eq!(fetcher.count(), 2);
    }

    #[tokio::test]
    async fn refresh_bypasses_ttl() {
        let fetcher = CountingFetcher::new(empty_set());
        let cache = TtlKeySetCache::new(fetcher.clone(), Duration::from_secs(60))
            .with_refresh_cooldown(Duration::ZERO);

        cache.current().await.unwrap();
        cache.refresh().await.unwrap();

        assert_eq!(fetcher.count(), 2);
    }

    #[tokio::test]
    async fn refresh_within_cooldown_serves_cached_set() {
        let fetcher = CountingFetcher::new(empty_set());
        let cache = TtlKeySetCache::new(fetcher.clone(), Duration::from_secs(60))
            .with_refresh_cooldown(Duration::from_secs(60));

        cache.current().await.unwrap();
        for _ in 0..5 {
            cache.refresh().await.unwrap();
        }

        assert_eq!(fetcher.count(), 1);
    }

    #[tokio::test]
    async fn refresh_on_empty_cache_fetches() {
        let fetcher = CountingFetcher::new(empty_set());
        let cache = TtlKeySetCache::new(fetcher.clone(), Duration::from_secs(60));

        cache.refresh().await.unwrap();

        assert_eq!(fetcher.count(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_service_unavailable() {
        let cache = TtlKeySetCache::new(FailingFetcher, DEFAULT_KEY_SET_TTL);

        let err = cache.current().await.unwrap_err();

        assert!(err.is_transient());
    }
}
