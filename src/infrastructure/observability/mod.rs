//! Observability infrastructure - Metrics

mod config;
mod metrics;

pub use config::{MetricsConfig, ObservabilityConfig};
pub use metrics::{
    PrometheusMetrics, ProxyRequestMetricParams, create_metrics_router, init_metrics,
    record_proxy_request,
};
