//! The proxy handler - every request under the gateway mount prefix lands
//! here, runs the pipeline, and leaves as either the upstream's response or
//! the normalized error envelope.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, FromRequest, Multipart, OriginalUri, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reqwest::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue, TRANSFER_ENCODING};

use crate::api::state::AppState;
use crate::api::types::ProxyError;
use crate::domain::error::GatewayError;
use crate::infrastructure::observability::{ProxyRequestMetricParams, record_proxy_request};
use crate::infrastructure::proxy::{
    MultipartAttachment, MultipartField, MultipartPayload, ProxyBody, ProxyContext,
    RATE_LIMIT_HEADER, UpstreamResponse,
};

/// Largest request body the gateway will buffer for forwarding.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

pub async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Response {
    let started = Instant::now();

    let method = request.method().clone();
    let headers = request.headers().clone();
    let path = uri.path().to_string();
    let query = uri.query().map(String::from);
    let client_ip = addr.ip().to_string();

    let (ctx, result) = match read_body(request).await {
        Ok(body) => {
            let ctx = ProxyContext::new(method, path, query, headers, body, client_ip);
            state.pipeline.execute(ctx).await
        }
        Err(error) => {
            let ctx =
                ProxyContext::new(method, path, query, headers, ProxyBody::empty(), client_ip);
            (ctx, Err(error))
        }
    };

    let response = match result {
        Ok(upstream) => success_response(&ctx, upstream),
        Err(error) => ProxyError::translate(&error, ctx.forward_url.as_deref()).into_response(),
    };

    record_proxy_request(ProxyRequestMetricParams {
        proxy_path: ctx
            .api
            .as_ref()
            .map(|api| api.proxy_path.as_str())
            .unwrap_or("unmatched"),
        subscription: ctx
            .subscription
            .as_ref()
            .map(|subscription| subscription.name.as_str())
            .unwrap_or("unknown"),
        path: &ctx.path,
        status: response.status().as_u16(),
        duration: started.elapsed(),
    });

    response
}

/// Buffer the request body, decoding multipart payloads into fields and
/// attachments so the transport can re-encode them.
async fn read_body(request: Request) -> Result<ProxyBody, GatewayError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &()).await.map_err(|err| {
            GatewayError::invalid_request(format!("multipart body rejected: {err}"))
        })?;
        decode_multipart(multipart).await
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|err| {
                GatewayError::invalid_request(format!("failed to read request body: {err}"))
            })?;
        Ok(ProxyBody::Raw(bytes))
    }
}

async fn decode_multipart(mut multipart: Multipart) -> Result<ProxyBody, GatewayError> {
    let mut payload = MultipartPayload::default();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        GatewayError::invalid_request(format!("multipart field rejected: {err}"))
    })? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(String::from);
        let content_type = field.content_type().map(String::from);

        // A filename marks a binary attachment; everything else is a text
        // field.
        if file_name.is_some() {
            let data = field.bytes().await.map_err(|err| {
                GatewayError::invalid_request(format!("failed to read attachment {name}: {err}"))
            })?;
            payload.attachments.push(MultipartAttachment {
                name,
                file_name,
                content_type,
                data,
            });
        } else {
            let value = field.text().await.map_err(|err| {
                GatewayError::invalid_request(format!("failed to read field {name}: {err}"))
            })?;
            payload.fields.push(MultipartField { name, value });
        }
    }

    Ok(ProxyBody::Multipart(payload))
}

/// Relay the upstream response, minus connection-level headers, plus the
/// throttle ceiling header when the Api carries one.
fn success_response(ctx: &ProxyContext, upstream: UpstreamResponse) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::OK);

    let mut headers = upstream.headers;
    headers.remove(CONNECTION);
    headers.remove(TRANSFER_ENCODING);
    headers.remove(CONTENT_LENGTH);

    if let Some(max_requests) = ctx.api.as_ref().and_then(|api| api.throttle_ceiling()) {
        headers.insert(RATE_LIMIT_HEADER, HeaderValue::from(max_requests));
    }

    (status, headers, upstream.body).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::Router;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::Request as HttpRequest;
    use reqwest::header::AUTHORIZATION;
    use tower::ServiceExt;
    use wiremock::matchers::{body_string_contains, header, method as http_method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::router::create_router;
    use crate::config::GatewayConfig;
    use crate::domain::access::{AccessListRepository, AccessPolicy, AccessRule};
    use crate::domain::subscription::{Api, Subscription, SubscriptionRepository};
    use crate::infrastructure::access::{AccessGate, InMemoryAccessListRepository};
    use crate::infrastructure::cache::ResponseCache;
    use crate::infrastructure::proxy::{GatewayPipeline, HttpForwarder, SUBSCRIPTION_KEY_HEADER};
    use crate::infrastructure::subscription::{InMemorySubscriptionRepository, SubscriptionCache};
    use crate::infrastructure::throttle::RateLimiter;

    fn app_state(subscriptions: Vec<Subscription>, rules: Vec<AccessRule>) -> AppState {
        let subscription_repo: Arc<dyn SubscriptionRepository> = Arc::new(
            InMemorySubscriptionRepository::with_subscriptions(subscriptions),
        );
        let access_repo: Arc<dyn AccessListRepository> =
            Arc::new(InMemoryAccessListRepository::with_rules(rules));
        let cache = Arc::new(SubscriptionCache::new(100, Duration::from_secs(300)));
        let limiter = Arc::new(RateLimiter::new());

        let pipeline = GatewayPipeline::new(
            AccessGate::new(Arc::clone(&access_repo)),
            Arc::clone(&subscription_repo),
            Arc::clone(&cache),
            Arc::clone(&limiter),
            Arc::new(ResponseCache::new(100)),
            Arc::new(HttpForwarder::new()),
        );

        AppState {
            pipeline: Arc::new(pipeline),
            subscription_cache: cache,
            rate_limiter: limiter,
            subscriptions: subscription_repo,
            access_rules: access_repo,
            gateway_config: GatewayConfig::default(),
        }
    }

    fn test_app(state: AppState) -> Router {
        create_router(state, None).layer(MockConnectInfo(SocketAddr::from(([10, 0, 0, 1], 5555))))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str, key: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .uri(uri)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .header(AUTHORIZATION, "Bearer caller-token")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_proxies_request_to_upstream() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(url_path("/get"))
            .and(header("x-forward-for", "10.0.0.1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("from-upstream"))
            .expect(1)
            .mount(&server)
            .await;

        let subscription =
            Subscription::new("key-1", "main").with_api(Api::new("/bin", server.uri(), "team"));
        let app = test_app(app_state(vec![subscription], vec![]));

        let response = app.oneshot(get("/gateway/bin/get", "key-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), b"from-upstream");
    }

    #[tokio::test]
    async fn test_unknown_key_returns_the_error_envelope() {
        let app = test_app(app_state(vec![], vec![]));

        let response = app.oneshot(get("/gateway/bin/get", "nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["route_id"], "gateway");
        assert_eq!(body["kind"], "subscription_not_found");
        assert_eq!(
            body["message"],
            "Subscription with given key not found or is inactive"
        );
        assert_eq!(
            body["upstream"],
            "no upstream URL was resolved for this request"
        );
    }

    #[tokio::test]
    async fn test_blocked_caller_is_rejected_with_403() {
        let rules = vec![AccessRule::new(
            "10.0.0.1",
            AccessPolicy::Blacklisted,
            "ops",
        )];
        let subscription = Subscription::new("key-1", "main")
            .with_api(Api::new("/bin", "http://unused.local", "team"));
        let app = test_app(app_state(vec![subscription], rules));

        let response = app.oneshot(get("/gateway/bin/get", "key-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["kind"], "access_denied");
        assert_eq!(body["message"], "10.0.0.1 is blocked or has no access");
    }

    #[tokio::test]
    async fn test_throttled_api_reports_ceiling_then_rejects() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(url_path("/get"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let subscription = Subscription::new("key-1", "main")
            .with_api(Api::new("/bin", server.uri(), "team").with_max_requests(2));
        let state = app_state(vec![subscription], vec![]);

        for _ in 0..2 {
            let response = test_app(state.clone())
                .oneshot(get("/gateway/bin/get", "key-1"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers().get(RATE_LIMIT_HEADER).unwrap(), "2");
        }

        let response = test_app(state)
            .oneshot(get("/gateway/bin/get", "key-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = body_json(response).await;
        assert_eq!(body["kind"], "rate_limit_exceeded");
        assert_eq!(
            body["message"],
            "Exceeded the max throttle rate of 2 within 60000ms"
        );
    }

    #[tokio::test]
    async fn test_upstream_error_passes_status_and_body_through() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(url_path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("kaboom"))
            .mount(&server)
            .await;

        let subscription =
            Subscription::new("key-1", "main").with_api(Api::new("/bin", server.uri(), "team"));
        let app = test_app(app_state(vec![subscription], vec![]));

        let response = app
            .oneshot(get("/gateway/bin/broken", "key-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["kind"], "upstream_failure");
        assert_eq!(body["message"], "kaboom");
        assert_eq!(body["upstream"], format!("{}/broken", server.uri()));
    }

    #[tokio::test]
    async fn test_multipart_request_is_decoded_and_reencoded() {
        let server = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(url_path("/upload"))
            .and(body_string_contains("hello-note"))
            .and(body_string_contains("file-bytes"))
            .and(body_string_contains("a.txt"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let subscription =
            Subscription::new("key-1", "main").with_api(Api::new("/bin", server.uri(), "team"));
        let app = test_app(app_state(vec![subscription], vec![]));

        let body = concat!(
            "--boundary\r\n",
            "Content-Disposition: form-data; name=\"note\"\r\n\r\n",
            "hello-note\r\n",
            "--boundary\r\n",
            "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "file-bytes\r\n",
            "--boundary--\r\n",
        );
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/gateway/bin/upload")
            .header(SUBSCRIPTION_KEY_HEADER, "key-1")
            .header(CONTENT_TYPE, "multipart/form-data; boundary=boundary")
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cached_get_is_served_without_a_second_forward() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(url_path("/get"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain")
                    .set_body_string("cache-me"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let subscription = Subscription::new("key-1", "main")
            .with_api(Api::new("/bin", server.uri(), "team").with_caching(60, vec![]));
        let state = app_state(vec![subscription], vec![]);

        let first = test_app(state.clone())
            .oneshot(get("/gateway/bin/get", "key-1"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert!(first.headers().get("x-apim-cache").is_none());

        let second = test_app(state)
            .oneshot(get("/gateway/bin/get", "key-1"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers().get("x-apim-cache").unwrap(), "true");
        assert_eq!(second.headers().get("x-apim-cache-ttl").unwrap(), "60");

        let bytes = axum::body::to_bytes(second.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), b"cache-me");
    }

    #[tokio::test]
    async fn test_path_without_api_segment_is_not_found() {
        let subscription = Subscription::new("key-1", "main")
            .with_api(Api::new("/bin", "http://unused.local", "team"));
        let app = test_app(app_state(vec![subscription], vec![]));

        let response = app.oneshot(get("/gateway", "key-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["kind"], "api_not_found");
    }
}
