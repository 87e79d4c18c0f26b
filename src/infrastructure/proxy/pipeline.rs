//! The gateway pipeline: admission, routing, injection and forwarding

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{
    CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, HeaderMap, HeaderName, HeaderValue, TE,
    TRANSFER_ENCODING, UPGRADE,
};
use tracing::debug;

use super::context::{
    CACHE_HEADER, CACHE_TTL_HEADER, FORWARD_FOR_HEADER, ProxyBody, ProxyContext,
    SUBSCRIPTION_KEY_HEADER,
};
use super::credentials;
use super::forwarder::{ForwardRequest, ForwardTransport, UpstreamResponse};
use super::router;
use crate::domain::error::GatewayError;
use crate::domain::subscription::SubscriptionRepository;
use crate::infrastructure::access::AccessGate;
use crate::infrastructure::cache::ResponseCache;
use crate::infrastructure::logging::redact;
use crate::infrastructure::subscription::SubscriptionCache;
use crate::infrastructure::throttle::RateLimiter;

/// Runs every proxied request through the admission stages in a fixed
/// order and forwards the survivors upstream.
///
/// Stage order is load-bearing: the access gate sees every request, routing
/// needs the resolved subscription, credentials are only spent on routed
/// requests, and the throttle is charged last so a rejected request never
/// consumes window capacity for work that would not have been forwarded.
pub struct GatewayPipeline {
    gate: AccessGate,
    subscriptions: Arc<dyn SubscriptionRepository>,
    cache: Arc<SubscriptionCache>,
    limiter: Arc<RateLimiter>,
    response_cache: Arc<ResponseCache>,
    transport: Arc<dyn ForwardTransport>,
}

impl GatewayPipeline {
    pub fn new(
        gate: AccessGate,
        subscriptions: Arc<dyn SubscriptionRepository>,
        cache: Arc<SubscriptionCache>,
        limiter: Arc<RateLimiter>,
        response_cache: Arc<ResponseCache>,
        transport: Arc<dyn ForwardTransport>,
    ) -> Self {
        Self {
            gate,
            subscriptions,
            cache,
            limiter,
            response_cache,
            transport,
        }
    }

    /// Run the full pipeline, returning the context alongside the outcome so
    /// the handler can translate errors and read back routing state.
    pub async fn execute(
        &self,
        mut ctx: ProxyContext,
    ) -> (ProxyContext, Result<UpstreamResponse, GatewayError>) {
        let result = self.run(&mut ctx).await;
        (ctx, result)
    }

    async fn run(&self, ctx: &mut ProxyContext) -> Result<UpstreamResponse, GatewayError> {
        self.gate.check(&ctx.client_ip).await?;
        self.resolve_subscription(ctx).await?;
        router::resolve(ctx)?;

        if let Some(cached) = self.serve_cached(ctx).await {
            return Ok(cached);
        }

        credentials::inject(ctx)?;
        self.throttle(ctx).await?;

        let request = build_forward_request(ctx)?;
        let response = self.transport.forward(request).await?;
        self.store_response(ctx, &response).await;
        Ok(response)
    }

    async fn resolve_subscription(&self, ctx: &mut ProxyContext) -> Result<(), GatewayError> {
        let key = ctx
            .subscription_key
            .clone()
            .ok_or(GatewayError::SubscriptionNotFound)?;

        let repository = Arc::clone(&self.subscriptions);
        let loader_key = key.clone();
        let subscription = self
            .cache
            .get_or_load(&key, move || async move {
                repository.find_by_key(&loader_key).await
            })
            .await?;

        debug!(
            subscription = %subscription.name,
            key = %redact(&key),
            "subscription resolved"
        );
        ctx.subscription = Some(subscription);
        Ok(())
    }

    /// Serve a stored response for cacheable GET requests. Always records
    /// the cache key on the context so a miss gets stored after the forward.
    async fn serve_cached(&self, ctx: &mut ProxyContext) -> Option<UpstreamResponse> {
        if ctx.method != Method::GET {
            return None;
        }
        let api = ctx.api.as_ref()?;
        if !api.caches_path(&ctx.path) {
            return None;
        }

        let key = response_cache_key(ctx);
        ctx.cache_key = Some(key.clone());

        let cached = self.response_cache.get(&key).await?;
        debug!(path = %ctx.path, "serving response from cache");

        let mut headers = HeaderMap::new();
        if let Some(content_type) = cached.content_type.as_deref() {
            if let Ok(value) = HeaderValue::from_str(content_type) {
                headers.insert(CONTENT_TYPE, value);
            }
        }
        headers.insert(CACHE_HEADER, HeaderValue::from_static("true"));
        headers.insert(CACHE_TTL_HEADER, HeaderValue::from(cached.ttl_secs));

        Some(UpstreamResponse {
            status: cached.status,
            headers,
            body: cached.body,
        })
    }

    async fn throttle(&self, ctx: &ProxyContext) -> Result<(), GatewayError> {
        let Some(max_requests) = ctx.api()?.throttle_ceiling() else {
            return Ok(());
        };
        let key = ctx.subscription()?.key.clone();
        self.limiter.admit(&key, max_requests).await
    }

    async fn store_response(&self, ctx: &ProxyContext, response: &UpstreamResponse) {
        let Some(key) = ctx.cache_key.as_deref() else {
            return;
        };
        let Some(ttl_secs) = ctx.api.as_ref().and_then(|api| api.caching_ttl) else {
            return;
        };

        let stored = self
            .response_cache
            .store_if_cacheable(
                key,
                response.status,
                response.content_type(),
                response.body.clone(),
                Duration::from_secs(ttl_secs),
            )
            .await;
        if stored {
            debug!(path = %ctx.path, ttl_secs, "stored upstream response in cache");
        }
    }
}

/// Cache entries are scoped per subscription; two callers never share one.
fn response_cache_key(ctx: &ProxyContext) -> String {
    let key = ctx
        .subscription
        .as_ref()
        .map(|subscription| subscription.key.as_str())
        .unwrap_or_default();
    match ctx.query.as_deref() {
        Some(query) if !query.is_empty() => format!("{}:{}?{}", key, ctx.path, query),
        _ => format!("{}:{}", key, ctx.path),
    }
}

/// Assemble the outbound request: forward URL plus query, headers minus the
/// gateway's own key header, connection-level noise and anything the
/// transport regenerates itself.
fn build_forward_request(ctx: &mut ProxyContext) -> Result<ForwardRequest, GatewayError> {
    let forward_url = ctx
        .forward_url
        .clone()
        .ok_or_else(|| GatewayError::internal("no forward URL resolved on context"))?;

    let mut headers = ctx.headers.clone();
    headers.remove(SUBSCRIPTION_KEY_HEADER);
    headers.remove(HOST);
    headers.remove(CONTENT_LENGTH);
    headers.remove(CONNECTION);
    headers.remove(TRANSFER_ENCODING);
    headers.remove(TE);
    headers.remove(UPGRADE);

    let body = std::mem::replace(&mut ctx.body, ProxyBody::empty());
    if let ProxyBody::Multipart(payload) = &body {
        // The transport re-encodes the form with a fresh boundary; the
        // inbound content type and any header shadowing a field name would
        // corrupt it.
        headers.remove(CONTENT_TYPE);
        for field in &payload.fields {
            if let Ok(name) = HeaderName::from_bytes(field.name.as_bytes()) {
                headers.remove(name);
            }
        }
    }

    if let Ok(value) = HeaderValue::from_str(&ctx.client_ip) {
        headers.insert(FORWARD_FOR_HEADER, value);
    }

    let url = match ctx.query.as_deref() {
        Some(query) if !query.is_empty() => format!("{forward_url}?{query}"),
        _ => forward_url,
    };

    Ok(ForwardRequest {
        method: ctx.method.clone(),
        url,
        headers,
        body,
        client_auth: ctx.client_auth.take(),
    })
}
