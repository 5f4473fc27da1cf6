//! Prometheus metrics endpoint
//!
//! Exposes bridge attempt and artifact counters in Prometheus format.

use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

/// Global Prometheus handle for metrics export
static PROMETHEUS_HANDLE: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
});

/// Initialize metrics (call once at startup)
pub fn init_metrics() {
    let _ = &*PROMETHEUS_HANDLE;
    register_metrics();
}

fn register_metrics() {
    metrics::describe_counter!(
        "omnibridge_attempts_total",
        "Model service exchanges by bridge mode and outcome"
    );
    metrics::describe_histogram!(
        "omnibridge_attempt_duration_seconds",
        "Duration of a single model service exchange in seconds"
    );
    metrics::describe_counter!(
        "omnibridge_artifacts_total",
        "Correlated results returned to callers"
    );
}

/// Prometheus metrics endpoint handler
pub async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE.render()
}

/// Record one exchange with the model service
pub fn record_attempt(mode: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "omnibridge_attempts_total",
        "mode" => mode.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!("omnibridge_attempt_duration_seconds", "mode" => mode.to_string())
        .record(duration_secs);
}

/// Record the results a completed bridge request produced
pub fn record_artifacts(mode: &str, count: u64) {
    metrics::counter!("omnibridge_artifacts_total", "mode" => mode.to_string()).increment(count);
}
