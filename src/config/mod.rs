//! Application configuration

mod app_config;

pub use app_config::{
    AccessRuleSeed, ApiSeed, AppConfig, CredentialSeed, GatewayConfig, LogFormat, LoggingConfig,
    ProvisioningConfig, ServerConfig, SubscriptionSeed,
};
