//! Subscription domain - caller identity, Apis and credentials

pub mod entity;
pub mod repository;

pub use entity::{Api, ApiCredential, ApiKeyLocation, AuthenticationType, Subscription};
#[cfg(test)]
pub use repository::MockSubscriptionRepository;
pub use repository::SubscriptionRepository;
