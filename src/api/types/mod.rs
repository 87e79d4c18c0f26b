//! API layer types

pub mod error;

pub use error::{GATEWAY_ROUTE_ID, ProxyError, ProxyErrorKind, ProxyErrorResponse};
