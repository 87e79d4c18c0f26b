//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::State, response::IntoResponse, routing::get};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    let builder = PrometheusBuilder::new();

    match builder.install_recorder() {
        Ok(handle) => {
            register_default_metrics();

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

fn register_default_metrics() {
    // Register default metrics with initial values
    gauge!("apim_gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record one proxied request, whatever its outcome
pub fn record_proxy_request(params: ProxyRequestMetricParams) {
    let labels = [
        ("proxy_path", params.proxy_path.to_string()),
        ("subscription", params.subscription.to_string()),
        ("path", sanitize_path(params.path)),
        ("status", params.status.to_string()),
    ];

    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels).record(params.duration.as_secs_f64());

    // Track 5xx outcomes separately
    if params.status >= 500 {
        counter!("gateway_upstream_errors_total", &labels).increment(1);
    }
}

/// Parameters for proxied request metrics
pub struct ProxyRequestMetricParams<'a> {
    /// Matched Api proxy path, or a placeholder when routing failed
    pub proxy_path: &'a str,
    /// Resolved subscription name, or a placeholder when unresolved
    pub subscription: &'a str,
    pub path: &'a str,
    pub status: u16,
    pub duration: Duration,
}

/// Sanitize URL path for metric labels (remove IDs, limit cardinality)
fn sanitize_path(path: &str) -> String {
    // Replace UUIDs and numeric IDs with placeholders
    let path = regex::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .unwrap()
        .replace_all(path, "{id}");

    let path = regex::Regex::new(r"/\d+(/|$)")
        .unwrap()
        .replace_all(&path, "/{id}$1");

    // Truncate long paths
    if path.len() > 50 {
        path[..50].to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_uuid() {
        let path = "/bin/orders/550e8400-e29b-41d4-a716-446655440000";
        let sanitized = sanitize_path(path);
        assert_eq!(sanitized, "/bin/orders/{id}");
    }

    #[test]
    fn test_sanitize_path_numeric_id() {
        let path = "/bin/users/123/orders";
        let sanitized = sanitize_path(path);
        assert_eq!(sanitized, "/bin/users/{id}/orders");
    }

    #[test]
    fn test_sanitize_path_no_id() {
        let path = "/bin/get";
        let sanitized = sanitize_path(path);
        assert_eq!(sanitized, "/bin/get");
    }

    #[test]
    fn test_sanitize_path_truncates_long_paths() {
        let path = "/very/long/path/that/exceeds/the/maximum/allowed/length/for/metrics";
        let sanitized = sanitize_path(path);
        assert!(sanitized.len() <= 50);
    }

    #[test]
    fn test_proxy_request_metric_params() {
        let params = ProxyRequestMetricParams {
            proxy_path: "/bin",
            subscription: "main",
            path: "/gateway/bin/get",
            status: 200,
            duration: Duration::from_millis(500),
        };

        assert_eq!(params.proxy_path, "/bin");
        assert_eq!(params.subscription, "main");
        assert_eq!(params.status, 200);
    }
}
