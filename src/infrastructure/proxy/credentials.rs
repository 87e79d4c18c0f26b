//! Outbound credential injection per Api authentication type

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use tracing::debug;

use super::context::{ClientCredentialsGrant, ProxyContext};
use crate::domain::error::GatewayError;
use crate::domain::subscription::{ApiCredential, ApiKeyLocation, AuthenticationType};

/// Replace the caller's credentials with the ones stored for the matched
/// Api.
///
/// The inbound `Authorization` header never travels upstream regardless of
/// authentication type; whatever the Api requires is attached in its place.
/// CLIENT_CREDENTIALS parameters go on the context for the transport to
/// exchange out of band instead of into a header.
pub fn inject(ctx: &mut ProxyContext) -> Result<(), GatewayError> {
    ctx.headers.remove(AUTHORIZATION);

    let auth_type = ctx.api()?.auth_type();
    if auth_type == AuthenticationType::Passthrough {
        return Ok(());
    }

    let proxy_path = ctx.api()?.proxy_path.clone();
    let credential = ctx
        .subscription()?
        .credential_for(&proxy_path)
        .cloned()
        .ok_or(GatewayError::MissingCredentials { auth_type })?;

    debug!(proxy_path = %proxy_path, auth = %auth_type, "applying Api credentials");

    match auth_type {
        AuthenticationType::Basic => apply_basic(ctx, &credential),
        AuthenticationType::ApiKey => apply_api_key(ctx, &credential),
        AuthenticationType::ClientCredentials => apply_client_credentials(ctx, &credential),
        AuthenticationType::Passthrough => Ok(()),
    }
}

fn apply_basic(ctx: &mut ProxyContext, credential: &ApiCredential) -> Result<(), GatewayError> {
    let username = required(&credential.username, "Username", AuthenticationType::Basic)?;
    let password = required(&credential.password, "Password", AuthenticationType::Basic)?;

    let encoded = STANDARD.encode(format!("{username}:{password}"));
    let value = HeaderValue::from_str(&format!("Basic {encoded}")).map_err(|err| {
        GatewayError::invalid_credential_config(format!(
            "Basic credential does not form a valid header value: {err}"
        ))
    })?;
    ctx.headers.insert(AUTHORIZATION, value);
    Ok(())
}

fn apply_api_key(ctx: &mut ProxyContext, credential: &ApiCredential) -> Result<(), GatewayError> {
    let key = required(&credential.api_key, "Api Key", AuthenticationType::ApiKey)?;
    let name = required(
        &credential.api_key_header,
        "Api Key Header",
        AuthenticationType::ApiKey,
    )?;

    match credential.api_key_location.unwrap_or(ApiKeyLocation::Header) {
        ApiKeyLocation::Header => {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                GatewayError::invalid_credential_config(format!(
                    "Api Key Header {name} is not a valid header name: {err}"
                ))
            })?;
            let value = HeaderValue::from_str(key).map_err(|err| {
                GatewayError::invalid_credential_config(format!(
                    "Api Key is not a valid header value: {err}"
                ))
            })?;
            ctx.headers.insert(header, value);
        }
        ApiKeyLocation::Query => {
            let pair = format!("{name}={key}");
            ctx.query = Some(match ctx.query.take() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{pair}"),
                _ => pair,
            });
        }
    }
    Ok(())
}

fn apply_client_credentials(
    ctx: &mut ProxyContext,
    credential: &ApiCredential,
) -> Result<(), GatewayError> {
    let scheme = AuthenticationType::ClientCredentials;
    let client_id = required(&credential.client_id, "Client Id", scheme)?;
    let client_secret = required(&credential.client_secret, "Client Secret", scheme)?;
    let token_url = required(&credential.client_url, "Client Url", scheme)?;

    ctx.client_auth = Some(ClientCredentialsGrant {
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        token_url: token_url.to_string(),
        scope: credential.client_scope.clone(),
    });
    Ok(())
}

/// A credential field the scheme cannot work without.
fn required<'a>(
    value: &'a Option<String>,
    field: &str,
    auth_type: AuthenticationType,
) -> Result<&'a str, GatewayError> {
    value
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            GatewayError::invalid_credential_config(format!(
                "No {field} was provided for {auth_type} authentication"
            ))
        })
}
