//! Route resolution - Api segment extraction and forward URL

use tracing::debug;

use super::context::ProxyContext;
use crate::domain::error::GatewayError;

/// Match the request path against the resolved subscription's Apis and
/// compute the upstream forward URL.
///
/// The first path segment is the gateway mount prefix; the segment after it
/// is the routing key and must equal an enabled Api's proxy path. The
/// remainder of the path is appended to that Api's upstream base URL.
pub fn resolve(ctx: &mut ProxyContext) -> Result<(), GatewayError> {
    let Some((segment, remainder)) = split_target(&ctx.path) else {
        return Err(GatewayError::api_not_found(ctx.path.clone()));
    };

    let api = ctx
        .subscription()?
        .find_api(segment)
        .cloned()
        .ok_or_else(|| GatewayError::api_not_found(segment.to_string()))?;

    let forward_url = format!("{}{}", api.proxy_url, remainder);
    debug!(proxy_path = %api.proxy_path, forward_url = %forward_url, "route resolved");

    ctx.forward_url = Some(forward_url);
    ctx.api = Some(api);
    Ok(())
}

/// Split a request path into the Api segment (with its leading slash) and
/// the trailing remainder.
///
/// `/gateway/bin/get` splits into `/bin` and `/get`; a path without a
/// segment after the mount prefix has no routing key.
fn split_target(path: &str) -> Option<(&str, &str)> {
    if !path.starts_with('/') {
        return None;
    }
    let mount_end = path[1..].find('/').map(|i| i + 1)?;
    let target = &path[mount_end..];
    let segment_end = target[1..].find('/').map(|i| i + 1).unwrap_or(target.len());
    Some((&target[..segment_end], &target[segment_end..]))
}
