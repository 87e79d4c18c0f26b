//! Subscription, Api and credential snapshot types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authentication scheme an Api requires towards its upstream.
///
/// An absent value on the Api is equivalent to [`Passthrough`]: the gateway
/// forwards without attaching any credential of its own.
///
/// [`Passthrough`]: AuthenticationType::Passthrough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationType {
    Basic,
    ApiKey,
    ClientCredentials,
    #[default]
    #[serde(alias = "NONE")]
    Passthrough,
}

impl std::fmt::Display for AuthenticationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Basic => "BASIC",
            Self::ApiKey => "API_KEY",
            Self::ClientCredentials => "CLIENT_CREDENTIALS",
            Self::Passthrough => "PASSTHROUGH",
        };
        write!(f, "{name}")
    }
}

/// Where an API_KEY credential is placed on the forwarded request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiKeyLocation {
    Header,
    Query,
}

/// One upstream target exposed under a unique proxy path.
///
/// `proxy_path` is the routing key: the path segment between the gateway
/// mount prefix and the rest of the request path must equal it exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Api {
    pub id: Uuid,
    pub proxy_path: String,
    pub proxy_url: String,
    pub owner: String,
    pub enabled: bool,
    pub authentication_type: Option<AuthenticationType>,
    /// Admission ceiling per rolling minute; `None` (or zero) is unlimited.
    pub max_requests: Option<u32>,
    pub caching_enabled: bool,
    /// Response cache lifetime in seconds when caching is enabled.
    pub caching_ttl: Option<u64>,
    /// Path fragments eligible for response caching; empty means every path.
    pub cached_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Api {
    pub fn new(
        proxy_path: impl Into<String>,
        proxy_url: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            proxy_path: proxy_path.into(),
            proxy_url: proxy_url.into(),
            owner: owner.into(),
            enabled: true,
            authentication_type: None,
            max_requests: None,
            caching_enabled: false,
            caching_ttl: None,
            cached_paths: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_authentication(mut self, auth_type: AuthenticationType) -> Self {
        self.authentication_type = Some(auth_type);
        self
    }

    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = Some(max_requests);
        self
    }

    pub fn with_caching(mut self, ttl_secs: u64, cached_paths: Vec<String>) -> Self {
        self.caching_enabled = true;
        self.caching_ttl = Some(ttl_secs);
        self.cached_paths = cached_paths;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Effective authentication type; an absent value means passthrough.
    pub fn auth_type(&self) -> AuthenticationType {
        self.authentication_type.unwrap_or_default()
    }

    /// Admission ceiling if throttling applies to this Api.
    pub fn throttle_ceiling(&self) -> Option<u32> {
        self.max_requests.filter(|max| *max > 0)
    }

    /// Whether responses for the given request path may be cached.
    pub fn caches_path(&self, path: &str) -> bool {
        if !self.caching_enabled || self.caching_ttl.is_none() {
            return false;
        }
        self.cached_paths.is_empty()
            || self.cached_paths.iter().any(|fragment| path.contains(fragment))
    }
}

/// Secret material for one (subscription, Api) pair.
///
/// Which fields are populated depends on the Api's authentication type;
/// values arrive already decrypted from the backing store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCredential {
    pub id: Uuid,
    /// Proxy path of the Api this credential belongs to.
    pub api_path: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub client_url: Option<String>,
    pub client_scope: Option<String>,
    pub api_key: Option<String>,
    pub api_key_header: Option<String>,
    pub api_key_location: Option<ApiKeyLocation>,
}

impl ApiCredential {
    fn empty(api_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            api_path: api_path.into(),
            username: None,
            password: None,
            client_id: None,
            client_secret: None,
            client_url: None,
            client_scope: None,
            api_key: None,
            api_key_header: None,
            api_key_location: None,
        }
    }

    pub fn basic(
        api_path: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::empty(api_path)
        }
    }

    pub fn api_key(
        api_path: impl Into<String>,
        key: impl Into<String>,
        header: impl Into<String>,
        location: ApiKeyLocation,
    ) -> Self {
        Self {
            api_key: Some(key.into()),
            api_key_header: Some(header.into()),
            api_key_location: Some(location),
            ..Self::empty(api_path)
        }
    }

    pub fn client_credentials(
        api_path: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        client_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            client_url: Some(client_url.into()),
            ..Self::empty(api_path)
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.client_scope = Some(scope.into());
        self
    }
}

/// A caller identity: secret key plus the Apis it may call and the
/// credentials used for each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    pub enabled: bool,
    pub end_date: Option<DateTime<Utc>>,
    pub apis: Vec<Api>,
    pub credentials: Vec<ApiCredential>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            name: name.into(),
            enabled: true,
            end_date: None,
            apis: Vec::new(),
            credentials: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_api(mut self, api: Api) -> Self {
        self.apis.push(api);
        self
    }

    pub fn with_credential(mut self, credential: ApiCredential) -> Self {
        self.credentials.push(credential);
        self
    }

    pub fn with_end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether this subscription may be used right now.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.end_date.is_none_or(|end| end > now)
    }

    /// Find the enabled Api whose proxy path equals the given segment.
    pub fn find_api(&self, proxy_path: &str) -> Option<&Api> {
        self.apis
            .iter()
            .find(|api| api.enabled && api.proxy_path == proxy_path)
    }

    /// Credential stored for the Api at the given proxy path, if any.
    pub fn credential_for(&self, proxy_path: &str) -> Option<&ApiCredential> {
        self.credentials
            .iter()
            .find(|credential| credential.api_path == proxy_path)
    }
}
