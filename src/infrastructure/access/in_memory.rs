//! In-memory access list repository

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::access::{AccessListRepository, AccessRule};
use crate::domain::error::GatewayError;

/// Access rules held in memory, keyed by their address or CIDR string.
///
/// Safe for concurrent readers and writers; the gate only ever reads, while
/// an administrative caller may upsert or remove rules at runtime.
pub struct InMemoryAccessListRepository {
    rules: RwLock<HashMap<String, AccessRule>>,
}

impl InMemoryAccessListRepository {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_rules(rules: Vec<AccessRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| (rule.ip.clone(), rule))
            .collect();
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Insert a rule, replacing any existing rule for the same address.
    pub async fn upsert(&self, rule: AccessRule) {
        self.rules.write().await.insert(rule.ip.clone(), rule);
    }

    /// Remove the rule for an address; returns whether one existed.
    pub async fn remove(&self, ip: &str) -> bool {
        self.rules.write().await.remove(ip).is_some()
    }

    pub async fn count(&self) -> usize {
        self.rules.read().await.len()
    }
}

impl Default for InMemoryAccessListRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessListRepository for InMemoryAccessListRepository {
    async fn find_exact(&self, ip: &str) -> Result<Option<AccessRule>, GatewayError> {
        Ok(self.rules.read().await.get(ip).cloned())
    }

    async fn cidr_rules(&self) -> Result<Vec<AccessRule>, GatewayError> {
        let rules = self.rules.read().await;
        Ok(rules.values().filter(|rule| rule.is_cidr()).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access::AccessPolicy;

    #[tokio::test]
    async fn test_exact_lookup_ignores_cidr_rules() {
        let repo = InMemoryAccessListRepository::with_rules(vec![
            AccessRule::new("10.0.0.1", AccessPolicy::Whitelisted, "test"),
            AccessRule::new("10.0.0.0/24", AccessPolicy::Blacklisted, "test"),
        ]);

        let found = repo.find_exact("10.0.0.1").await.unwrap();
        assert!(found.is_some());
        assert!(repo.find_exact("10.0.0.2").await.unwrap().is_none());

        let cidrs = repo.cidr_rules().await.unwrap();
        assert_eq!(cidrs.len(), 1);
        assert_eq!(cidrs[0].ip, "10.0.0.0/24");
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let repo = InMemoryAccessListRepository::new();
        repo.upsert(AccessRule::new("10.0.0.1", AccessPolicy::Whitelisted, "alice"))
            .await;
        repo.upsert(AccessRule::new("10.0.0.1", AccessPolicy::Blacklisted, "bob"))
            .await;

        assert_eq!(repo.count().await, 1);
        let rule = repo.find_exact("10.0.0.1").await.unwrap().unwrap();
        assert!(rule.is_blacklisted());
        assert_eq!(rule.updated_by, "bob");
    }

    #[tokio::test]
    async fn test_remove() {
        let repo = InMemoryAccessListRepository::new();
        repo.upsert(AccessRule::new("10.0.0.1", AccessPolicy::Whitelisted, "test"))
            .await;

        assert!(repo.remove("10.0.0.1").await);
        assert!(!repo.remove("10.0.0.1").await);
        assert_eq!(repo.count().await, 0);
    }
}
