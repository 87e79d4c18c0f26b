//! Subscription repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::Subscription;
use crate::domain::error::GatewayError;

/// Read side of subscription storage, consumed by the gateway pipeline as
/// the cache loader.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Resolve a subscription by its secret key.
    ///
    /// Returns a fully populated snapshot (Apis and credentials) in one
    /// call. An unknown, disabled or expired key resolves to
    /// [`GatewayError::SubscriptionNotFound`].
    async fn find_by_key(&self, key: &str) -> Result<Subscription, GatewayError>;
}
