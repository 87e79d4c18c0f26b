//! APIM Gateway
//!
//! Subscription-based request admission and upstream forwarding:
//! - IP access lists with exact and CIDR rules
//! - Read-through subscription cache over the backing store
//! - Per-Api credential injection (BASIC, API_KEY, CLIENT_CREDENTIALS)
//! - Rolling-window throttling and response caching

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use api::state::AppState;
use config::{AccessRuleSeed, ApiSeed, CredentialSeed, SubscriptionSeed};
use domain::access::{AccessListRepository, AccessRule};
use domain::subscription::{Api, ApiCredential, Subscription, SubscriptionRepository};
use infrastructure::access::{AccessGate, InMemoryAccessListRepository};
use infrastructure::cache::ResponseCache;
use infrastructure::proxy::{GatewayPipeline, HttpForwarder};
use infrastructure::subscription::{InMemorySubscriptionRepository, SubscriptionCache};
use infrastructure::throttle::RateLimiter;

/// Create the application state with all pipeline stages wired up
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let apis: Vec<Api> = config.provisioning.apis.iter().map(build_api).collect();

    let subscriptions: Vec<Subscription> = config
        .provisioning
        .subscriptions
        .iter()
        .map(|seed| build_subscription(seed, &apis))
        .collect();

    let rules: Vec<AccessRule> = config
        .provisioning
        .access_rules
        .iter()
        .map(build_access_rule)
        .collect();

    info!(
        apis = apis.len(),
        subscriptions = subscriptions.len(),
        access_rules = rules.len(),
        "Provisioning loaded"
    );

    let subscription_repo: Arc<dyn SubscriptionRepository> = Arc::new(
        InMemorySubscriptionRepository::with_subscriptions(subscriptions),
    );
    let access_repo: Arc<dyn AccessListRepository> =
        Arc::new(InMemoryAccessListRepository::with_rules(rules));

    let subscription_cache = Arc::new(SubscriptionCache::new(
        config.gateway.cache_size,
        Duration::from_secs(config.gateway.cache_keep_time_secs),
    ));
    let rate_limiter = Arc::new(RateLimiter::new());
    let response_cache = Arc::new(ResponseCache::new(config.gateway.cache_size as u64));
    let forwarder = Arc::new(HttpForwarder::with_timeout(Duration::from_secs(
        config.gateway.forward_timeout_secs,
    )));

    let pipeline = GatewayPipeline::new(
        AccessGate::new(Arc::clone(&access_repo)),
        Arc::clone(&subscription_repo),
        Arc::clone(&subscription_cache),
        Arc::clone(&rate_limiter),
        response_cache,
        forwarder,
    );

    Ok(AppState {
        pipeline: Arc::new(pipeline),
        subscription_cache,
        rate_limiter,
        subscriptions: subscription_repo,
        access_rules: access_repo,
        gateway_config: config.gateway.clone(),
    })
}

// ============================================================================
// Seed conversion
// ============================================================================

fn build_api(seed: &ApiSeed) -> Api {
    let mut api = Api::new(&seed.proxy_path, &seed.proxy_url, &seed.owner);

    if let Some(auth_type) = seed.authentication_type {
        api = api.with_authentication(auth_type);
    }
    if let Some(max_requests) = seed.max_requests {
        api = api.with_max_requests(max_requests);
    }
    if seed.caching_enabled {
        match seed.caching_ttl {
            Some(ttl) => api = api.with_caching(ttl, seed.cached_paths.clone()),
            None => warn!(
                proxy_path = %seed.proxy_path,
                "caching enabled without a ttl, ignoring"
            ),
        }
    }
    if !seed.enabled {
        api = api.disabled();
    }

    api
}

fn build_subscription(seed: &SubscriptionSeed, apis: &[Api]) -> Subscription {
    let mut subscription = Subscription::new(&seed.key, &seed.name);

    for path in &seed.api_paths {
        match apis.iter().find(|api| &api.proxy_path == path) {
            Some(api) => subscription = subscription.with_api(api.clone()),
            None => warn!(
                subscription = %seed.name,
                proxy_path = %path,
                "subscription references an unprovisioned Api"
            ),
        }
    }

    for credential in &seed.credentials {
        subscription = subscription.with_credential(build_credential(credential));
    }

    if let Some(end_date) = seed.end_date {
        subscription = subscription.with_end_date(end_date);
    }
    if !seed.enabled {
        subscription = subscription.disabled();
    }

    subscription
}

fn build_credential(seed: &CredentialSeed) -> ApiCredential {
    ApiCredential {
        id: Uuid::new_v4(),
        api_path: seed.api_path.clone(),
        username: seed.username.clone(),
        password: seed.password.clone(),
        client_id: seed.client_id.clone(),
        client_secret: seed.client_secret.clone(),
        client_url: seed.client_url.clone(),
        client_scope: seed.client_scope.clone(),
        api_key: seed.api_key.clone(),
        api_key_header: seed.api_key_header.clone(),
        api_key_location: seed.api_key_location,
    }
}

fn build_access_rule(seed: &AccessRuleSeed) -> AccessRule {
    let rule = AccessRule::new(&seed.ip, seed.policy, "provisioning");
    match &seed.description {
        Some(description) => rule.with_description(description),
        None => rule,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::subscription::AuthenticationType;

    fn api_seed(proxy_path: &str) -> ApiSeed {
        ApiSeed {
            proxy_path: proxy_path.to_string(),
            proxy_url: "https://upstream.example".to_string(),
            owner: "team".to_string(),
            enabled: true,
            authentication_type: None,
            max_requests: None,
            caching_enabled: false,
            caching_ttl: None,
            cached_paths: Vec::new(),
        }
    }

    #[test]
    fn test_build_api_applies_optional_settings() {
        let mut seed = api_seed("/bin");
        seed.authentication_type = Some(AuthenticationType::Basic);
        seed.max_requests = Some(5);
        seed.caching_enabled = true;
        seed.caching_ttl = Some(120);

        let api = build_api(&seed);
        assert_eq!(api.auth_type(), AuthenticationType::Basic);
        assert_eq!(api.throttle_ceiling(), Some(5));
        assert!(api.caches_path("/anything"));
    }

    #[test]
    fn test_build_api_ignores_caching_without_ttl() {
        let mut seed = api_seed("/bin");
        seed.caching_enabled = true;

        let api = build_api(&seed);
        assert!(!api.caches_path("/anything"));
    }

    #[test]
    fn test_build_subscription_resolves_api_paths() {
        let apis = vec![build_api(&api_seed("/bin")), build_api(&api_seed("/pets"))];
        let seed = SubscriptionSeed {
            key: "key-1".to_string(),
            name: "main".to_string(),
            enabled: true,
            end_date: None,
            api_paths: vec!["/bin".to_string(), "/missing".to_string()],
            credentials: vec![CredentialSeed {
                api_path: "/bin".to_string(),
                username: Some("user".to_string()),
                password: Some("pass".to_string()),
                client_id: None,
                client_secret: None,
                client_url: None,
                client_scope: None,
                api_key: None,
                api_key_header: None,
                api_key_location: None,
            }],
        };

        let subscription = build_subscription(&seed, &apis);
        assert_eq!(subscription.apis.len(), 1);
        assert_eq!(subscription.apis[0].proxy_path, "/bin");
        assert_eq!(subscription.credentials.len(), 1);
        assert_eq!(
            subscription.credentials[0].username.as_deref(),
            Some("user")
        );
    }

    #[tokio::test]
    async fn test_create_app_state_wires_provisioned_entities() {
        let mut config = AppConfig::default();
        config.provisioning.apis.push(api_seed("/bin"));
        config.provisioning.subscriptions.push(SubscriptionSeed {
            key: "key-1".to_string(),
            name: "main".to_string(),
            enabled: true,
            end_date: None,
            api_paths: vec!["/bin".to_string()],
            credentials: Vec::new(),
        });

        let state = create_app_state(&config).await.unwrap();
        let subscription = state.subscriptions.find_by_key("key-1").await.unwrap();
        assert_eq!(subscription.apis.len(), 1);
    }
}
