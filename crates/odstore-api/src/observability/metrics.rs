//! Prometheus metrics infrastructure.
//!
//! Metrics are recorded through the `metrics` facade and exposed by
//! `metrics-exporter-prometheus`.
//!
//! # Metrics Exposed
//!
//! - `odstore_http_requests_total` - HTTP requests by method, path, status class
//! - `odstore_http_request_duration_seconds` - HTTP request duration histogram
//! - `odstore_batch_requests_total` - `$batch` requests by result
//! - `odstore_batch_subrequests_total` - sub-requests seen in accepted batches
//! - `odstore_batch_rollbacks_total` - changesets rolled back

use std::sync::Arc;

use axum::{extract::State, http::header::CONTENT_TYPE, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use odstore_server::handlers::batch::BatchStats;

/// Shared state containing the Prometheus handle for metrics rendering.
#[derive(Clone)]
pub struct MetricsState {
    handle: Arc<PrometheusHandle>,
}

impl MetricsState {
    pub fn new(handle: PrometheusHandle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// Renders the current metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Error type for metrics initialization.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to install Prometheus recorder: recorder already installed")]
    AlreadyInstalled,
}

/// Installs the global Prometheus recorder. Must be called once at startup.
pub fn init_metrics() -> Result<MetricsState, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|_| MetricsError::AlreadyInstalled)?;

    describe_metrics();

    Ok(MetricsState::new(handle))
}

fn describe_metrics() {
    metrics::describe_counter!(
        "odstore_http_requests_total",
        "Total number of HTTP requests"
    );
    metrics::describe_histogram!(
        "odstore_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    metrics::describe_counter!(
        "odstore_batch_requests_total",
        "Total number of $batch requests by result"
    );
    metrics::describe_counter!(
        "odstore_batch_subrequests_total",
        "Total number of sub-requests in accepted $batch requests"
    );
    metrics::describe_counter!(
        "odstore_batch_rollbacks_total",
        "Total number of changesets rolled back"
    );
}

/// Prometheus exposition format content type.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Handler for the `/metrics` endpoint.
pub async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.render())
}

/// The `result` label of an accepted batch.
///
/// `ok` when every unit succeeded, `partial` when some unit failed and
/// `timed_out` when the deadline or a disconnect stopped dispatching.
pub fn batch_result_label(stats: &BatchStats) -> &'static str {
    if stats.timed_out {
        "timed_out"
    } else if stats.failed_units > 0 {
        "partial"
    } else {
        "ok"
    }
}

/// Records an accepted (executed) batch.
pub fn record_batch(stats: &BatchStats) {
    metrics::counter!("odstore_batch_requests_total", "result" => batch_result_label(stats))
        .increment(1);
    metrics::counter!("odstore_batch_subrequests_total").increment(stats.sub_requests as u64);
    if stats.rollbacks > 0 {
        metrics::counter!("odstore_batch_rollbacks_total").increment(stats.rollbacks as u64);
    }
}

/// Records a batch rejected before execution.
pub fn record_batch_rejected(code: &'static str) {
    metrics::counter!(
        "odstore_batch_requests_total",
        "result" => "rejected",
        "code" => code
    )
    .increment(1);
}
