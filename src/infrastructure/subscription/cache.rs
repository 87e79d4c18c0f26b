//! Bounded subscription snapshot cache
//!
//! Read-through cache in front of the subscription repository. Entries are
//! point-in-time snapshots; they are replaced only by explicit invalidation
//! or by the lazy sweep that runs when an insert finds the cache full.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::error::GatewayError;
use crate::domain::subscription::Subscription;
use crate::infrastructure::logging::redact;

struct CacheEntry {
    value: Arc<Subscription>,
    inserted_at: Instant,
}

/// Subscription snapshots keyed by secret key.
///
/// The capacity check and the insert are two steps around a loader call that
/// runs unlocked, so simultaneous misses may briefly push the map past
/// `max_entries`; the sweep only evicts entries older than `keep_time`, so
/// the bound is soft when every entry is fresh.
pub struct SubscriptionCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_entries: usize,
    keep_time: Duration,
}

impl SubscriptionCache {
    pub fn new(max_entries: usize, keep_time: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
            keep_time,
        }
    }

    /// Fetch the snapshot for `key`, invoking `loader` on a miss.
    ///
    /// The loader runs outside the cache lock; two racing misses for the
    /// same key may both load, with the later insert winning. Loader
    /// failures propagate and are never cached.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        loader: F,
    ) -> Result<Arc<Subscription>, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Subscription, GatewayError>>,
    {
        if let Some(entry) = self.entries.read().await.get(key) {
            debug!(key = %redact(key), "subscription cache hit");
            return Ok(entry.value.clone());
        }

        debug!(key = %redact(key), "subscription cache miss, loading");
        let value = Arc::new(loader().await?);

        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries {
            self.sweep_stale(&mut entries);
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                inserted_at: Instant::now(),
            },
        );

        Ok(value)
    }

    /// Drop the entry for one subscription key.
    pub async fn invalidate(&self, key: &str) {
        if self.entries.write().await.remove(key).is_some() {
            debug!(key = %redact(key), "subscription cache entry invalidated");
        }
    }

    /// Drop every entry. Used after Api-wide mutations, since an Api may be
    /// referenced by any number of cached subscriptions.
    pub async fn clear_all(&self) {
        let mut entries = self.entries.write().await;
        let evicted = entries.len();
        entries.clear();
        debug!(evicted, "subscription cache cleared");
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn sweep_stale(&self, entries: &mut HashMap<String, CacheEntry>) {
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() <= self.keep_time);
        debug!(evicted = before - entries.len(), "subscription cache swept at capacity");
    }
}
