//! Observability infrastructure for odstore.
//!
//! This module provides:
//! - Prometheus metrics endpoint and batch metrics
//! - Structured logging configuration

mod logging;
mod metrics;

pub use logging::{create_json_layer, init_logging, parse_level, LoggingConfig};
pub use metrics::{
    batch_result_label, init_metrics, metrics_handler, record_batch, record_batch_rejected,
    MetricsError, MetricsState,
};
