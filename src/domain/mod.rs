//! Domain layer - Core entities, errors and repository traits

pub mod access;
pub mod error;
pub mod subscription;

pub use access::{AccessListRepository, AccessPolicy, AccessRule};
pub use error::GatewayError;
pub use subscription::{
    Api, ApiCredential, ApiKeyLocation, AuthenticationType, Subscription, SubscriptionRepository,
};
