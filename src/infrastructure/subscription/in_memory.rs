//! In-memory subscription repository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::error::GatewayError;
use crate::domain::subscription::{Subscription, SubscriptionRepository};
use crate::infrastructure::logging::redact;

/// Subscriptions held in memory, keyed by secret key.
///
/// Snapshots are stored fully populated (Apis and credentials inline), so a
/// lookup is a single clone with no joins.
pub struct InMemorySubscriptionRepository {
    subscriptions: RwLock<HashMap<String, Subscription>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_subscriptions(subscriptions: Vec<Subscription>) -> Self {
        let subscriptions = subscriptions
            .into_iter()
            .map(|subscription| (subscription.key.clone(), subscription))
            .collect();
        Self {
            subscriptions: RwLock::new(subscriptions),
        }
    }

    pub async fn insert(&self, subscription: Subscription) {
        self.subscriptions
            .write()
            .await
            .insert(subscription.key.clone(), subscription);
    }

    pub async fn count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

impl Default for InMemorySubscriptionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn find_by_key(&self, key: &str) -> Result<Subscription, GatewayError> {
        let subscriptions = self.subscriptions.read().await;
        match subscriptions.get(key) {
            Some(subscription) if subscription.is_active(Utc::now()) => {
                Ok(subscription.clone())
            }
            Some(_) => {
                debug!(key = %redact(key), "subscription is disabled or past its end date");
                Err(GatewayError::SubscriptionNotFound)
            }
            None => Err(GatewayError::SubscriptionNotFound),
        }
    }
}
