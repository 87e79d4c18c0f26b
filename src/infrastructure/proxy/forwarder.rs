//! Upstream forwarding over HTTP

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use reqwest::header::{AUTHORIZATION, CONNECTION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, multipart};
use serde::Deserialize;
use tracing::{debug, warn};

use super::context::{ClientCredentialsGrant, MultipartPayload, ProxyBody};
use crate::domain::error::GatewayError;

/// A fully prepared outbound request, ready to hand to the transport.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Complete upstream URL including the query string.
    pub url: String,
    pub headers: HeaderMap,
    pub body: ProxyBody,
    /// When set, the transport exchanges these for a bearer token first.
    pub client_auth: Option<ClientCredentialsGrant>,
}

/// What came back from the upstream (or from the response cache).
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
    }
}

/// Transport seam between the pipeline and the network (for mocking).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ForwardTransport: Send + Sync {
    async fn forward(&self, request: ForwardRequest) -> Result<UpstreamResponse, GatewayError>;
}

/// Real transport using reqwest.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
}

impl HttpForwarder {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(60))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Trade CLIENT_CREDENTIALS for a bearer token at the credential's token
    /// endpoint.
    async fn exchange_client_credentials(
        &self,
        grant: &ClientCredentialsGrant,
    ) -> Result<String, GatewayError> {
        debug!(
            token_url = %grant.token_url,
            client_id = %grant.client_id,
            "exchanging client credentials for a bearer token"
        );

        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", grant.client_id.as_str()),
            ("client_secret", grant.client_secret.as_str()),
        ];
        if let Some(scope) = grant.scope.as_deref() {
            form.push(("scope", scope));
        }

        let response = self
            .client
            .post(&grant.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|err| GatewayError::transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "token endpoint rejected the exchange");
            return Err(GatewayError::UpstreamFailure {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await.map_err(|err| {
            GatewayError::transport(format!("token endpoint returned an unreadable body: {err}"))
        })?;
        Ok(token.access_token)
    }
}

impl Default for HttpForwarder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[async_trait]
impl ForwardTransport for HttpForwarder {
    async fn forward(&self, request: ForwardRequest) -> Result<UpstreamResponse, GatewayError> {
        let ForwardRequest {
            method,
            url,
            mut headers,
            body,
            client_auth,
        } = request;

        if let Some(grant) = client_auth {
            let token = self.exchange_client_credentials(&grant).await?;
            let value =
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(|err| {
                    GatewayError::transport(format!(
                        "token does not form a valid header value: {err}"
                    ))
                })?;
            headers.insert(AUTHORIZATION, value);
        }

        // One connection per proxied request.
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        debug!(method = %method, url = %url, "forwarding to upstream");

        let mut builder = self.client.request(method, url.as_str()).headers(headers);
        builder = match body {
            ProxyBody::Raw(bytes) if bytes.is_empty() => builder,
            ProxyBody::Raw(bytes) => builder.body(bytes),
            ProxyBody::Multipart(payload) => builder.multipart(build_multipart_form(payload)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|err| GatewayError::transport(err.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| GatewayError::transport(err.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), url = %url, "upstream returned an error status");
            return Err(GatewayError::UpstreamFailure {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(UpstreamResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// Rebuild a decoded multipart payload as a reqwest form; reqwest supplies
/// the content type and a fresh boundary.
fn build_multipart_form(payload: MultipartPayload) -> Result<multipart::Form, GatewayError> {
    let mut form = multipart::Form::new();

    for field in payload.fields {
        form = form.text(field.name, field.value);
    }

    for attachment in payload.attachments {
        let mut part = multipart::Part::bytes(attachment.data.to_vec());
        if let Some(file_name) = attachment.file_name {
            part = part.file_name(file_name);
        }
        if let Some(content_type) = attachment.content_type {
            part = part.mime_str(&content_type).map_err(|err| {
                GatewayError::invalid_request(format!(
                    "attachment {} has an invalid content type: {err}",
                    attachment.name
                ))
            })?;
        }
        form = form.part(attachment.name, part);
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string_contains, header, method as http_method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::infrastructure::proxy::context::{MultipartAttachment, MultipartField};

    fn request(method: Method, url: String) -> ForwardRequest {
        ForwardRequest {
            method,
            url,
            headers: HeaderMap::new(),
            body: ProxyBody::empty(),
            client_auth: None,
        }
    }

    #[tokio::test]
    async fn test_forward_copies_method_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(path("/anything"))
            .and(header("x-test", "1"))
            .and(header("connection", "close"))
            .and(body_string_contains("payload"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-upstream", "yes")
                    .set_body_string("ok"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(Method::POST, format!("{}/anything", server.uri()));
        req.headers.insert("x-test", HeaderValue::from_static("1"));
        req.body = ProxyBody::Raw(Bytes::from_static(b"payload"));

        let response = HttpForwarder::new().forward(req).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_ref(), b"ok");
        assert_eq!(response.headers.get("x-upstream").unwrap(), "yes");
    }

    #[tokio::test]
    async fn test_upstream_error_status_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let req = request(Method::GET, format!("{}/broken", server.uri()));
        let result = HttpForwarder::new().forward(req).await;

        assert!(matches!(
            result,
            Err(GatewayError::UpstreamFailure { status: 500, ref body }) if body == "boom"
        ));
    }

    #[tokio::test]
    async fn test_client_credentials_exchange_attaches_bearer() {
        let server = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=client-1"))
            .and(body_string_contains("scope=read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "token_type": "Bearer",
                "expires_in": 3600,
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(http_method("GET"))
            .and(path("/data"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data"))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(Method::GET, format!("{}/data", server.uri()));
        req.client_auth = Some(ClientCredentialsGrant {
            client_id: "client-1".to_string(),
            client_secret: "shh".to_string(),
            token_url: format!("{}/token", server.uri()),
            scope: Some("read".to_string()),
        });

        let response = HttpForwarder::new().forward(req).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_failed_token_exchange_stops_the_forward() {
        let server = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad client"))
            .mount(&server)
            .await;

        let mut req = request(Method::GET, format!("{}/data", server.uri()));
        req.client_auth = Some(ClientCredentialsGrant {
            client_id: "client-1".to_string(),
            client_secret: "wrong".to_string(),
            token_url: format!("{}/token", server.uri()),
            scope: None,
        });

        let result = HttpForwarder::new().forward(req).await;
        assert!(matches!(
            result,
            Err(GatewayError::UpstreamFailure { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_multipart_body_is_reencoded() {
        let server = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(path("/upload"))
            .and(body_string_contains("field-value"))
            .and(body_string_contains("hello-file"))
            .and(body_string_contains("a.txt"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = request(Method::POST, format!("{}/upload", server.uri()));
        req.body = ProxyBody::Multipart(MultipartPayload {
            fields: vec![MultipartField {
                name: "note".to_string(),
                value: "field-value".to_string(),
            }],
            attachments: vec![MultipartAttachment {
                name: "file".to_string(),
                file_name: Some("a.txt".to_string()),
                content_type: Some("text/plain".to_string()),
                data: Bytes::from_static(b"hello-file"),
            }],
        });

        let response = HttpForwarder::new().forward(req).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_a_transport_error() {
        // A builder-created server is exclusive (not pooled), so dropping it
        // actually frees the port; `MockServer::start()` servers are returned
        // to wiremock's pool on drop and keep answering 404.
        let server = MockServer::builder().start().await;
        let url = format!("{}/gone", server.uri());
        drop(server);

        let req = request(Method::GET, url);
        let result = HttpForwarder::new().forward(req).await;
        assert!(matches!(result, Err(GatewayError::Transport { .. })));
    }
}
