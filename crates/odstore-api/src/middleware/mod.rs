//! API middleware.
//!
//! Includes:
//! - Request ID propagation (with a per-request tracing span)
//! - HTTP metrics collection
//! - CORS configuration

mod metrics;
mod request_id;

pub use metrics::{MetricsLayer, RequestMetrics};
pub use request_id::{RequestIdLayer, REQUEST_ID_HEADER};

use tower_http::cors::{Any, CorsLayer};

/// Creates a permissive CORS layer that exposes every response header,
/// including `DataServiceVersion`, `ETag` and `Location`.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any)
}
