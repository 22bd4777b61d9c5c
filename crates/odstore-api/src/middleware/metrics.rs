//! HTTP metrics middleware.
//!
//! Emits `odstore_http_requests_total` and
//! `odstore_http_request_duration_seconds`, labelled with the method, the
//! matched route pattern and the status class. `$batch` calls and single
//! resource calls share the `/stores/:store_id/odata/*path` pattern; batch
//! specific counters live in [`crate::observability`].

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Instant,
};

use axum::{
    extract::MatchedPath,
    http::{Request, Response},
};
use tower::{Layer, Service};

/// Status class label for a response code.
fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

/// In-process request counters, mirrored to the `metrics` facade.
///
/// The atomic counters let tests observe what the middleware recorded
/// without installing a global recorder.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    requests: AtomicU64,
    client_errors: AtomicU64,
    server_errors: AtomicU64,
    total_duration_us: AtomicU64,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, method: &str, route: &str, status: u16, duration_us: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_duration_us
            .fetch_add(duration_us, Ordering::Relaxed);
        match status {
            400..=499 => {
                self.client_errors.fetch_add(1, Ordering::Relaxed);
            }
            500..=599 => {
                self.server_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        let labels = [
            ("method", method.to_string()),
            ("path", route.to_string()),
            ("status_class", status_class(status).to_string()),
        ];
        metrics::counter!("odstore_http_requests_total", &labels).increment(1);
        metrics::histogram!("odstore_http_request_duration_seconds", &labels)
            .record(duration_us as f64 / 1_000_000.0);
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn client_error_count(&self) -> u64 {
        self.client_errors.load(Ordering::Relaxed)
    }

    pub fn server_error_count(&self) -> u64 {
        self.server_errors.load(Ordering::Relaxed)
    }

    pub fn total_duration_us(&self) -> u64 {
        self.total_duration_us.load(Ordering::Relaxed)
    }
}

/// Layer that records [`RequestMetrics`] for every request.
#[derive(Clone)]
pub struct MetricsLayer {
    metrics: Arc<RequestMetrics>,
}

impl MetricsLayer {
    pub fn new(metrics: Arc<RequestMetrics>) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> Arc<RequestMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    metrics: Arc<RequestMetrics>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let start = Instant::now();
        let method = request.method().to_string();
        // Unmatched requests are labelled with a fixed value to bound cardinality.
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "unmatched".to_string());
        let metrics = Arc::clone(&self.metrics);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let response = inner.call(request).await?;
            let elapsed = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
            metrics.record(&method, &route, response.status().as_u16(), elapsed);
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_class() {
        assert_eq!(status_class(202), "2xx");
        assert_eq!(status_class(404), "4xx");
        assert_eq!(status_class(503), "5xx");
        assert_eq!(status_class(42), "other");
    }

    #[test]
    fn test_record_counts_error_classes() {
        let metrics = RequestMetrics::new();
        metrics.record("POST", "/stores/:store_id/odata/*path", 202, 1_000);
        metrics.record("POST", "/stores/:store_id/odata/*path", 400, 500);
        metrics.record("GET", "/stores/:store_id", 404, 250);
        metrics.record("GET", "/ready", 503, 250);

        assert_eq!(metrics.request_count(), 4);
        assert_eq!(metrics.client_error_count(), 2);
        assert_eq!(metrics.server_error_count(), 1);
        assert_eq!(metrics.total_duration_us(), 2_000);
    }
}
