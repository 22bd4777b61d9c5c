//! odstore-server: the `$batch` engine and server configuration
//!
//! This crate contains the transport-independent server logic:
//! - `$batch` envelope parsing, limits, execution and response composition
//! - Configuration management
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               odstore-server                │
//! ├─────────────────────────────────────────────┤
//! │  config.rs       - Configuration management │
//! │  handlers/batch/ - $batch processing        │
//! │    envelope.rs    - Top-level parts         │
//! │    changeset.rs   - Changeset parts         │
//! │    translator.rs  - Request blocks          │
//! │    guard.rs       - Headers and limits      │
//! │    coordinator.rs - Ordered execution       │
//! │    composer.rs    - Multipart response      │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod handlers;

// Re-exports for convenience
pub use config::{ConfigLoadError, ServerConfig};
pub use handlers::batch::{BatchLimits, BatchProcessor, BatchResponse, CancelFlag};
