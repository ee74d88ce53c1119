//! TTL cache for provider-backed extractions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::schema::Ticker;

const DEFAULT_TTL: Duration = Duration::from_secs(900);

/// One cache slot per ticker and requested history depth, so a five-year
/// request never serves a truncated two-year payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    ticker: Ticker,
    years: usize,
}

impl CacheKey {
    pub fn new(ticker: Ticker, years: usize) -> Self {
        Self { ticker, years }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn fresh(&self) -> bool {
        self.stored_at.elapsed() <= self.ttl
    }
}

/// Thread-safe TTL cache for serialized extraction results. Last write wins;
/// the batch runner never fetches the same key twice in true parallel, so no
/// per-key locking.
#[derive(Debug, Clone)]
pub struct CacheStore {
    entries: Arc<tokio::sync::RwLock<HashMap<CacheKey, CacheEntry>>>,
    default_ttl: Duration,
}

impl CacheStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
            default_ttl,
        }
    }

    /// 15-minute TTL, suitable for fundamentals data.
    pub fn with_default_ttl() -> Self {
        Self::new(DEFAULT_TTL)
    }

    /// A disabled cache never stores anything.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_disabled(&self) -> bool {
        self.default_ttl == Duration::ZERO
    }

    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.fresh())
            .map(|entry| entry.body.clone())
    }

    pub async fn put(&self, key: CacheKey, body: String, ttl_override: Option<Duration>) {
        if self.is_disabled() {
            return;
        }
        let entry = CacheEntry {
            body,
            stored_at: Instant::now(),
            ttl: ttl_override.unwrap_or(self.default_ttl),
        };
        let mut entries = self.entries.write().await;
        entries.insert(key, entry);
    }

    pub async fn clear_expired(&self) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.fresh());
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(ticker: &str, years: usize) -> CacheKey {
        CacheKey::new(Ticker::parse(ticker).expect("valid ticker"), years)
    }

    #[tokio::test]
    async fn basic_get_put_overwrite() {
        let cache = CacheStore::new(Duration::from_secs(1));

        assert!(cache.get(&key("AAPL", 5)).await.is_none());

        cache.put(key("AAPL", 5), "v1".to_string(), None).await;
        assert_eq!(cache.get(&key("AAPL", 5)).await, Some("v1".to_string()));

        cache.put(key("AAPL", 5), "v2".to_string(), None).await;
        assert_eq!(cache.get(&key("AAPL", 5)).await, Some("v2".to_string()));
    }

    #[tokio::test]
    async fn depth_is_part_of_the_key() {
        let cache = CacheStore::with_default_ttl();

        cache.put(key("AAPL", 5), "five".to_string(), None).await;
        assert!(cache.get(&key("AAPL", 2)).await.is_none());
        assert_eq!(cache.get(&key("AAPL", 5)).await, Some("five".to_string()));
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = CacheStore::new(Duration::from_millis(50));

        cache.put(key("MSFT", 5), "v".to_string(), None).await;
        assert!(cache.get(&key("MSFT", 5)).await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get(&key("MSFT", 5)).await.is_none());
    }

    #[tokio::test]
    async fn clear_expired_drops_stale_entries() {
        let cache = CacheStore::new(Duration::from_millis(50));

        cache.put(key("AAPL", 5), "v".to_string(), None).await;
        cache.put(key("MSFT", 5), "v".to_string(), None).await;
        assert_eq!(cache.len().await, 2);

        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.clear_expired().await;
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn disabled_cache_stores_nothing() {
        let cache = CacheStore::disabled();
        assert!(cache.is_disabled());

        cache.put(key("AAPL", 5), "v".to_string(), None).await;
        assert!(cache.get(&key("AAPL", 5)).await.is_none());
        assert_eq!(cache.len().await, 0);
    }
}
