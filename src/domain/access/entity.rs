//! IP access list types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a rule admits or blocks the addresses it covers.
///
/// A rule is exactly one of the two; there is no "both" or "neither" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    Whitelisted,
    Blacklisted,
}

/// One access list entry: an exact IP address or a CIDR block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRule {
    pub id: Uuid,
    /// Exact address (`10.1.2.3`) or CIDR block (`10.1.0.0/16`).
    pub ip: String,
    pub policy: AccessPolicy,
    pub updated_by: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessRule {
    pub fn new(
        ip: impl Into<String>,
        policy: AccessPolicy,
        updated_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            ip: ip.into(),
            policy,
            updated_by: updated_by.into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// CIDR rules carry a prefix length; exact rules do not.
    pub fn is_cidr(&self) -> bool {
        self.ip.contains('/')
    }

    pub fn is_whitelisted(&self) -> bool {
        self.policy == AccessPolicy::Whitelisted
    }

    pub fn is_blacklisted(&self) -> bool {
        self.policy == AccessPolicy::Blacklisted
    }
}
