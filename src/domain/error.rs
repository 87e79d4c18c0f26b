use thiserror::Error;

use super::subscription::AuthenticationType;

/// Pipeline stage failures
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{ip} is blocked or has no access")]
    AccessDenied { ip: String },

    #[error("Subscription with given key not found or is inactive")]
    SubscriptionNotFound,

    #[error("Api(proxyPath={proxy_path}) not found or was not enabled on current subscription")]
    ApiNotFound { proxy_path: String },

    #[error("Api requires {auth_type} authentication but no credentials were found for this Api")]
    MissingCredentials { auth_type: AuthenticationType },

    #[error("{message}")]
    InvalidCredentialConfig { message: String },

    #[error("Exceeded the max throttle rate of {max_requests} within {window_ms}ms")]
    RateLimitExceeded { max_requests: u32, window_ms: u64 },

    #[error("upstream responded with status {status}")]
    UpstreamFailure { status: u16, body: String },

    #[error("Failed to reach upstream: {message}")]
    Transport { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    pub fn access_denied(ip: impl Into<String>) -> Self {
        Self::AccessDenied { ip: ip.into() }
    }

    pub fn api_not_found(proxy_path: impl Into<String>) -> Self {
        Self::ApiNotFound {
            proxy_path: proxy_path.into(),
        }
    }

    pub fn missing_credentials(auth_type: AuthenticationType) -> Self {
        Self::MissingCredentials { auth_type }
    }

    pub fn invalid_credential_config(message: impl Into<String>) -> Self {
        Self::InvalidCredentialConfig {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
