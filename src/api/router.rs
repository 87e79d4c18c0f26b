use axum::extract::DefaultBodyLimit;
use axum::routing::{any, get};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::infrastructure::observability::{PrometheusMetrics, create_metrics_router};

use super::gateway;
use super::health;
use super::state::AppState;

/// Create the full router with application state
///
/// Every method and path under the configured context root falls through to
/// the proxy handler; the handler itself decides whether the request routes.
pub fn create_router(state: AppState, metrics: Option<PrometheusMetrics>) -> Router {
    let proxy_routes = Router::new()
        .route("/", any(gateway::proxy_handler))
        .route("/{*path}", any(gateway::proxy_handler))
        .layer(DefaultBodyLimit::max(gateway::MAX_BODY_BYTES));

    let mut router = Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        // Proxied traffic
        .nest(&state.gateway_config.context_root, proxy_routes)
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if let Some(metrics) = metrics {
        router = router.merge(create_metrics_router(metrics));
    }

    router
}
