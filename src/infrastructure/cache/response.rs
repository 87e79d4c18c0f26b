//! Cached upstream responses using moka

use std::time::Duration;

use bytes::Bytes;
use moka::future::Cache as MokaCache;
use tracing::debug;

/// Maximum body size eligible for caching (5 MiB).
const MAX_CACHED_BODY: usize = 5 * 1024 * 1024;

/// Statuses eligible for caching.
const CACHEABLE_STATUS: std::ops::RangeInclusive<u16> = 200..=204;

/// A stored upstream response, served back on a cache hit.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
    /// Lifetime the entry was stored with, echoed back on hits.
    pub ttl_secs: u64,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    response: CachedResponse,
    /// Expiration timestamp (millis since epoch)
    expires_at: u64,
}

/// Response cache for Apis that opt in to caching.
///
/// Entries carry their own per-Api TTL checked on read; moka's global
/// time-to-live sits at the maximum configurable TTL purely as an eviction
/// backstop.
#[derive(Debug)]
pub struct ResponseCache {
    cache: MokaCache<String, StoredEntry>,
}

impl ResponseCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(3600))
            .build();
        Self { cache }
    }

    /// Fetch a live entry for `key`, dropping it if its TTL has lapsed.
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let entry = self.cache.get(key).await?;
        if Self::current_time_millis() > entry.expires_at {
            self.cache.remove(key).await;
            return None;
        }
        Some(entry.response)
    }

    /// Store a response when it qualifies (cacheable status, body under the
    /// size cap); returns whether it was stored.
    pub async fn store_if_cacheable(
        &self,
        key: &str,
        status: u16,
        content_type: Option<String>,
        body: Bytes,
        ttl: Duration,
    ) -> bool {
        if !CACHEABLE_STATUS.contains(&status) || body.len() >= MAX_CACHED_BODY {
            return false;
        }

        let entry = StoredEntry {
            response: CachedResponse {
                status,
                content_type,
                body,
                ttl_secs: ttl.as_secs(),
            },
            expires_at: Self::current_time_millis() + ttl.as_millis() as u64,
        };
        self.cache.insert(key.to_string(), entry).await;
        debug!(key, ttl_secs = ttl.as_secs(), "upstream response cached");
        true
    }

    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    fn current_time_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
