//! Structured logging configuration.
//!
//! Log output goes through `tracing-subscriber`. JSON output is meant for
//! production, where one batch produces a line per dispatched sub-request at
//! `debug` and a summary line at `info`:
//!
//! ```json
//! {"timestamp":"2026-01-15T10:30:00.000Z","level":"INFO","target":"odstore_server::handlers::batch::coordinator","fields":{"message":"batch completed","sub_requests":4,"rollbacks":0}}
//! ```
//!
//! `RUST_LOG` takes precedence over the configured level.

use odstore_server::config::LoggingSettings;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

/// Configuration for structured logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// JSON output (true) or human-readable text (false).
    pub json_format: bool,
    /// The level used when `RUST_LOG` is not set.
    pub default_level: Level,
    /// Emit span enter/exit events.
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            default_level: Level::INFO,
            include_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn json() -> Self {
        Self {
            json_format: true,
            ..Default::default()
        }
    }

    pub fn text() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.include_spans = true;
        self
    }

    /// Builds the logging configuration from the `logging` config section.
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            json_format: settings.json,
            default_level: parse_level(&settings.level),
            include_spans: false,
        }
    }
}

/// Parses a level name case-insensitively; unknown names fall back to `INFO`.
///
/// Configuration validation rejects unknown names before this is reached.
pub fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(config: LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.to_string()));

    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_current_span(true)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        );
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .with_span_events(span_events)
                .with_target(true),
        );
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// A JSON subscriber writing to `writer`, used to capture log output in tests.
pub fn create_json_layer<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(EnvFilter::new("trace"))
        .with(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_current_span(true),
        )
}
