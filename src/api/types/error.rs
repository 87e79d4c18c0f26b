//! Normalized gateway error envelope

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::domain::error::GatewayError;

/// Route identifier carried on every envelope the gateway emits.
pub const GATEWAY_ROUTE_ID: &str = "gateway";

const NO_UPSTREAM_PLACEHOLDER: &str = "no upstream URL was resolved for this request";

/// Stable failure classification, one per pipeline stage outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyErrorKind {
    AccessDenied,
    SubscriptionNotFound,
    ApiNotFound,
    MissingCredentials,
    InvalidCredentialConfig,
    RateLimitExceeded,
    UpstreamFailure,
    Transport,
    InvalidRequest,
    Internal,
}

impl std::fmt::Display for ProxyErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccessDenied => write!(f, "access_denied"),
            Self::SubscriptionNotFound => write!(f, "subscription_not_found"),
            Self::ApiNotFound => write!(f, "api_not_found"),
            Self::MissingCredentials => write!(f, "missing_credentials"),
            Self::InvalidCredentialConfig => write!(f, "invalid_credential_config"),
            Self::RateLimitExceeded => write!(f, "rate_limit_exceeded"),
            Self::UpstreamFailure => write!(f, "upstream_failure"),
            Self::Transport => write!(f, "transport"),
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// JSON error body returned for any pipeline failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyErrorResponse {
    pub route_id: String,
    pub kind: ProxyErrorKind,
    pub message: String,
    /// Resolved upstream URL without its query string, or a placeholder when
    /// the failure happened before routing.
    pub upstream: String,
}

/// Envelope with its response status
#[derive(Debug)]
pub struct ProxyError {
    pub status: StatusCode,
    pub response: ProxyErrorResponse,
}

impl ProxyError {
    /// Translate a pipeline failure into the caller-facing envelope.
    pub fn translate(error: &GatewayError, forward_url: Option<&str>) -> Self {
        let (status, kind) = match error {
            GatewayError::AccessDenied { .. } => {
                (StatusCode::FORBIDDEN, ProxyErrorKind::AccessDenied)
            }
            GatewayError::SubscriptionNotFound => {
                (StatusCode::NOT_FOUND, ProxyErrorKind::SubscriptionNotFound)
            }
            GatewayError::ApiNotFound { .. } => (StatusCode::NOT_FOUND, ProxyErrorKind::ApiNotFound),
            GatewayError::MissingCredentials { .. } => {
                (StatusCode::BAD_REQUEST, ProxyErrorKind::MissingCredentials)
            }
            GatewayError::InvalidCredentialConfig { .. } => (
                StatusCode::BAD_REQUEST,
                ProxyErrorKind::InvalidCredentialConfig,
            ),
            GatewayError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                ProxyErrorKind::RateLimitExceeded,
            ),
            GatewayError::UpstreamFailure { status, .. } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                ProxyErrorKind::UpstreamFailure,
            ),
            GatewayError::Transport { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, ProxyErrorKind::Transport)
            }
            GatewayError::InvalidRequest { .. } => {
                (StatusCode::BAD_REQUEST, ProxyErrorKind::InvalidRequest)
            }
            GatewayError::Internal { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, ProxyErrorKind::Internal)
            }
        };

        // The upstream body is the primary message only when it says
        // something; blank bodies and the bare `{}` placeholder fall back to
        // the failure's own description.
        let message = match error {
            GatewayError::UpstreamFailure { body, .. } if !is_blank(body) => body.clone(),
            other => other.to_string(),
        };

        Self {
            status,
            response: ProxyErrorResponse {
                route_id: GATEWAY_ROUTE_ID.to_string(),
                kind,
                message,
                upstream: forward_url.unwrap_or(NO_UPSTREAM_PLACEHOLDER).to_string(),
            },
        }
    }
}

fn is_blank(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.is_empty() || trimmed == "{}"
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.response.kind, self.response.message)
    }
}

impl std::error::Error for ProxyError {}
