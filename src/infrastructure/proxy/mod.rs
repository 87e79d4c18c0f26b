//! Proxy pipeline: per-request context, routing, credential injection and
//! upstream forwarding

pub mod context;
pub mod credentials;
pub mod forwarder;
pub mod pipeline;
pub mod router;

pub use context::{
    CACHE_HEADER, CACHE_TTL_HEADER, ClientCredentialsGrant, FORWARD_FOR_HEADER, MultipartAttachment,
    MultipartField, MultipartPayload, ProxyBody, ProxyContext, RATE_LIMIT_HEADER,
    SUBSCRIPTION_KEY_HEADER,
};
pub use forwarder::{ForwardRequest, ForwardTransport, HttpForwarder, UpstreamResponse};
pub use pipeline::GatewayPipeline;
