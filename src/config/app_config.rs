use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use crate::domain::access::AccessPolicy;
use crate::domain::subscription::{ApiKeyLocation, AuthenticationType};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub observability: crate::infrastructure::observability::ObservabilityConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Tunables for the gateway pipeline itself
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GatewayConfig {
    /// Mount prefix all proxied requests live under
    #[serde(default = "default_context_root")]
    pub context_root: String,
    /// Subscription cache capacity (entries)
    #[validate(range(min = 10, max = 500))]
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// How long a cached subscription stays eligible after insertion
    #[validate(range(min = 60, max = 3600))]
    #[serde(default = "default_cache_keep_time")]
    pub cache_keep_time_secs: u64,
    /// Outbound request timeout towards upstreams
    #[serde(default = "default_forward_timeout")]
    pub forward_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Declarative seed data loaded at startup: subscriptions, the Apis they
/// may call, and access list rules.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProvisioningConfig {
    #[serde(default)]
    pub apis: Vec<ApiSeed>,
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSeed>,
    #[serde(default)]
    pub access_rules: Vec<AccessRuleSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSeed {
    pub proxy_path: String,
    pub proxy_url: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub authentication_type: Option<AuthenticationType>,
    #[serde(default)]
    pub max_requests: Option<u32>,
    #[serde(default)]
    pub caching_enabled: bool,
    #[serde(default)]
    pub caching_ttl: Option<u64>,
    #[serde(default)]
    pub cached_paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSeed {
    pub key: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Proxy paths of the Apis this subscription may call.
    #[serde(default)]
    pub api_paths: Vec<String>,
    #[serde(default)]
    pub credentials: Vec<CredentialSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialSeed {
    pub api_path: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub client_url: Option<String>,
    #[serde(default)]
    pub client_scope: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_header: Option<String>,
    #[serde(default)]
    pub api_key_location: Option<ApiKeyLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessRuleSeed {
    /// Exact address or CIDR block
    pub ip: String,
    pub policy: AccessPolicy,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_context_root() -> String {
    "/gateway".to_string()
}

fn default_cache_size() -> usize {
    100
}

fn default_cache_keep_time() -> u64 {
    300
}

fn default_forward_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            context_root: default_context_root(),
            cache_size: default_cache_size(),
            cache_keep_time_secs: default_cache_keep_time(),
            forward_timeout_secs: default_forward_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APIM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: Self = config.try_deserialize()?;
        app_config
            .gateway
            .validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(app_config)
    }
}
