//! odstore-api: HTTP API layer
//!
//! This crate provides the HTTP surface of odstore:
//! - Store and entity-type management endpoints via Axum
//! - Single OData resource requests and the `$batch` endpoint
//! - Storage-to-domain adapters
//! - Middleware and observability (request IDs, metrics, logging)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 odstore-api                 │
//! ├─────────────────────────────────────────────┤
//! │  http/          - Routes and app state      │
//! │  adapters.rs    - DataStore → domain        │
//! │  errors.rs      - JSON error responses      │
//! │  middleware/    - Request ID, metrics, CORS │
//! │  observability/ - Logging and Prometheus    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod errors;
pub mod http;
pub mod middleware;
pub mod observability;
