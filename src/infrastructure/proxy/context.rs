//! Request-scoped pipeline context

use std::sync::Arc;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::HeaderMap;

use crate::domain::error::GatewayError;
use crate::domain::subscription::{Api, Subscription};

/// Header that identifies the calling subscription.
pub const SUBSCRIPTION_KEY_HEADER: &str = "subscription-key";

/// Header carrying the caller address to the upstream.
pub const FORWARD_FOR_HEADER: &str = "x-forward-for";

/// Headers announcing a response served from the gateway cache.
pub const CACHE_HEADER: &str = "x-apim-cache";
pub const CACHE_TTL_HEADER: &str = "x-apim-cache-ttl";

/// Response header reporting the throttle ceiling to the caller.
pub const RATE_LIMIT_HEADER: &str = "x-ratelimit-limit";

/// One named text field of a multipart body.
#[derive(Debug, Clone)]
pub struct MultipartField {
    pub name: String,
    pub value: String,
}

/// One binary attachment of a multipart body.
#[derive(Debug, Clone)]
pub struct MultipartAttachment {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A decoded multipart body, re-encoded as one outgoing form on forward.
#[derive(Debug, Clone, Default)]
pub struct MultipartPayload {
    pub fields: Vec<MultipartField>,
    pub attachments: Vec<MultipartAttachment>,
}

/// Request body carried through the pipeline.
#[derive(Debug, Clone)]
pub enum ProxyBody {
    Raw(Bytes),
    Multipart(MultipartPayload),
}

impl ProxyBody {
    pub fn empty() -> Self {
        Self::Raw(Bytes::new())
    }
}

/// OAuth2 client-credentials parameters handed to the transport out of
/// band; never placed in a request header by the injector.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientCredentialsGrant {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub scope: Option<String>,
}

/// Everything one proxied request accumulates while moving through the
/// pipeline stages. Owned by a single request; never shared.
pub struct ProxyContext {
    pub method: Method,
    /// Request path including the gateway mount prefix, without the query.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: ProxyBody,
    pub client_ip: String,
    pub subscription_key: Option<String>,

    /// Set by the resolve stage.
    pub subscription: Option<Arc<Subscription>>,
    /// Set by the route stage.
    pub api: Option<Api>,
    /// Upstream URL without the query string; set by the route stage.
    pub forward_url: Option<String>,
    /// Set by the inject stage for CLIENT_CREDENTIALS Apis.
    pub client_auth: Option<ClientCredentialsGrant>,
    /// Set when the response qualifies for caching after the forward.
    pub cache_key: Option<String>,
}

impl ProxyContext {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: Option<String>,
        headers: HeaderMap,
        body: ProxyBody,
        client_ip: impl Into<String>,
    ) -> Self {
        let subscription_key = headers
            .get(SUBSCRIPTION_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(String::from);

        Self {
            method,
            path: path.into(),
            query,
            headers,
            body,
            client_ip: client_ip.into(),
            subscription_key,
            subscription: None,
            api: None,
            forward_url: None,
            client_auth: None,
            cache_key: None,
        }
    }

    /// Resolved subscription; stage ordering guarantees presence after the
    /// resolve stage.
    pub fn subscription(&self) -> Result<&Subscription, GatewayError> {
        self.subscription
            .as_deref()
            .ok_or_else(|| GatewayError::internal("no subscription resolved on context"))
    }

    /// Matched Api; stage ordering guarantees presence after the route
    /// stage.
    pub fn api(&self) -> Result<&Api, GatewayError> {
        self.api
            .as_ref()
            .ok_or_else(|| GatewayError::internal("no Api resolved on context"))
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn test_subscription_key_extracted_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            SUBSCRIPTION_KEY_HEADER,
            HeaderValue::from_static("secret-key"),
        );

        let ctx = ProxyContext::new(
            Method::GET,
            "/gateway/bin",
            None,
            headers,
            ProxyBody::empty(),
            "10.0.0.1",
        );
        assert_eq!(ctx.subscription_key.as_deref(), Some("secret-key"));
    }

    #[test]
    fn test_missing_or_empty_key_is_none() {
        let ctx = ProxyContext::new(
            Method::GET,
            "/gateway/bin",
            None,
            HeaderMap::new(),
            ProxyBody::empty(),
            "10.0.0.1",
        );
        assert!(ctx.subscription_key.is_none());

        let mut headers = HeaderMap::new();
        headers.insert(SUBSCRIPTION_KEY_HEADER, HeaderValue::from_static(""));
        let ctx = ProxyContext::new(
            Method::GET,
            "/gateway/bin",
            None,
            headers,
            ProxyBody::empty(),
            "10.0.0.1",
        );
        assert!(ctx.subscription_key.is_none());
    }

    #[test]
    fn test_accessors_require_prior_stages() {
        let ctx = ProxyContext::new(
            Method::GET,
            "/gateway/bin",
            None,
            HeaderMap::new(),
            ProxyBody::empty(),
            "10.0.0.1",
        );
        assert!(ctx.subscription().is_err());
        assert!(ctx.api().is_err());
    }
}
