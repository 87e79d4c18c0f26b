//! Access list repository trait

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entity::AccessRule;
use crate::domain::error::GatewayError;

/// Read side of the IP access list, consumed by the access gate.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccessListRepository: Send + Sync {
    /// Rule whose address equals the given IP exactly, if any.
    async fn find_exact(&self, ip: &str) -> Result<Option<AccessRule>, GatewayError>;

    /// All CIDR-flagged rules.
    async fn cidr_rules(&self) -> Result<Vec<AccessRule>, GatewayError>;
}
