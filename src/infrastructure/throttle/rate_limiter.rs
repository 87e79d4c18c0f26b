//! Rolling-window admission limiter
//!
//! One counter per subscription key over a trailing 60 second window. The
//! window slides continuously, so there is no burst admission at a bucket
//! boundary.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::error::GatewayError;
use crate::infrastructure::logging::redact;

const WINDOW: Duration = Duration::from_secs(60);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Per-key rolling admission counters.
///
/// State lives only in process memory; counters restart empty with the
/// process.
pub struct RateLimiter {
    records: RwLock<HashMap<String, Vec<Instant>>>,
    window: Duration,
    cleanup_interval: Duration,
    last_cleanup: RwLock<Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_window(WINDOW)
    }

    /// Limiter over a custom window. The idle-key cleanup runs at five
    /// window lengths, matching the default 60s/300s pairing.
    pub fn with_window(window: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            window,
            cleanup_interval: window * 5,
            last_cleanup: RwLock::new(Instant::now()),
        }
    }

    /// Admit or reject one call for `key` under a ceiling of
    /// `max_requests` per window.
    ///
    /// Rejection is immediate; nothing is queued and the rejected call is
    /// not recorded against the window.
    pub async fn admit(&self, key: &str, max_requests: u32) -> Result<(), GatewayError> {
        self.maybe_cleanup().await;

        let now = Instant::now();
        let mut records = self.records.write().await;
        let admitted = records.entry(key.to_string()).or_default();
        admitted.retain(|at| now.duration_since(*at) <= self.window);

        if admitted.len() as u32 >= max_requests {
            warn!(
                key = %redact(key),
                max_requests,
                "throttle ceiling reached, rejecting"
            );
            return Err(GatewayError::RateLimitExceeded {
                max_requests,
                window_ms: self.window.as_millis() as u64,
            });
        }

        admitted.push(now);
        debug!(
            key = %redact(key),
            admitted = admitted.len(),
            max_requests,
            "call admitted"
        );
        Ok(())
    }

    /// Number of keys currently holding window records.
    pub async fn tracked_keys(&self) -> usize {
        self.records.read().await.len()
    }

    async fn maybe_cleanup(&self) {
        let should_cleanup = {
            let last = self.last_cleanup.read().await;
            last.elapsed() >= self.cleanup_interval
        };

        if should_cleanup {
            let mut last = self.last_cleanup.write().await;
            *last = Instant::now();

            let now = Instant::now();
            let mut records = self.records.write().await;
            for admitted in records.values_mut() {
                admitted.retain(|at| now.duration_since(*at) <= self.window);
            }
            records.retain(|_, admitted| !admitted.is_empty());
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
