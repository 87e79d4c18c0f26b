//! Application state for shared gateway services

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::access::AccessListRepository;
use crate::domain::subscription::SubscriptionRepository;
use crate::infrastructure::proxy::GatewayPipeline;
use crate::infrastructure::subscription::SubscriptionCache;
use crate::infrastructure::throttle::RateLimiter;

/// Shared handles behind every handler. Cloned per request; all members are
/// reference counted.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<GatewayPipeline>,
    pub subscription_cache: Arc<SubscriptionCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub access_rules: Arc<dyn AccessListRepository>,
    pub gateway_config: GatewayConfig,
}
