//! IP admission checks against the access list

use std::net::IpAddr;
use std::sync::Arc;

use ipnet::IpNet;
use tracing::{debug, warn};

use crate::domain::access::AccessListRepository;
use crate::domain::error::GatewayError;
use crate::infrastructure::logging::redact;

/// Decides whether a caller address may proceed.
///
/// Exact-match rules win outright: a whitelisted exact entry admits the
/// address even when a blacklist CIDR covers it. Without an exact match,
/// whitelist CIDRs (when any exist) are the only way in; otherwise blacklist
/// CIDRs carve addresses out of a default allow.
pub struct AccessGate {
    rules: Arc<dyn AccessListRepository>,
}

impl AccessGate {
    pub fn new(rules: Arc<dyn AccessListRepository>) -> Self {
        Self { rules }
    }

    /// Check the caller address, failing with `AccessDenied` when blocked.
    pub async fn check(&self, ip: &str) -> Result<(), GatewayError> {
        debug!(ip = %redact(ip), "checking caller address against access list");

        if self.has_access(ip).await? {
            Ok(())
        } else {
            warn!(ip = %redact(ip), "caller address denied");
            Err(GatewayError::access_denied(ip))
        }
    }

    async fn has_access(&self, ip: &str) -> Result<bool, GatewayError> {
        if let Some(rule) = self.rules.find_exact(ip).await? {
            return Ok(rule.is_whitelisted());
        }

        let cidr_rules = self.rules.cidr_rules().await?;
        if cidr_rules.is_empty() {
            return Ok(true);
        }

        // An unparseable caller address can never be matched against a
        // range; it is denied outright.
        let Ok(addr) = ip.parse::<IpAddr>() else {
            warn!(ip = %redact(ip), "caller address does not parse");
            return Ok(false);
        };

        let whitelist: Vec<_> = cidr_rules.iter().filter(|r| r.is_whitelisted()).collect();
        if !whitelist.is_empty() {
            return Ok(whitelist.iter().any(|rule| in_range(addr, &rule.ip)));
        }

        let blocked = cidr_rules
            .iter()
            .filter(|r| r.is_blacklisted())
            .any(|rule| in_range(addr, &rule.ip));
        Ok(!blocked)
    }
}

/// Whether `addr` falls inside the CIDR block `cidr`.
///
/// A rule that does not parse as a CIDR block cannot describe any range and
/// matches nothing.
pub fn in_range(addr: IpAddr, cidr: &str) -> bool {
    match cidr.parse::<IpNet>() {
        Ok(net) => net.contains(&addr),
        Err(_) => {
            warn!(rule = %cidr, "access rule is not a valid CIDR block, skipping");
            false
        }
    }
}
