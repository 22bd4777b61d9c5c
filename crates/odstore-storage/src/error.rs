//! Storage error types.

use std::time::Duration;

use thiserror::Error;

/// Storage-specific errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Store not found.
    #[error("store not found: {store_id}")]
    StoreNotFound { store_id: String },

    /// Store already exists.
    #[error("store already exists: {store_id}")]
    StoreAlreadyExists { store_id: String },

    /// Entity type (entity set) not found.
    #[error("entity type not found: {name}")]
    EntityTypeNotFound { name: String },

    /// Entity type already exists.
    #[error("entity type already exists: {name}")]
    EntityTypeAlreadyExists { name: String },

    /// Entity not found.
    #[error("entity not found: {entity_set}('{id}')")]
    EntityNotFound { entity_set: String, id: String },

    /// An entity with the same key already exists in the entity set.
    #[error("entity already exists: {entity_set}('{id}')")]
    EntityAlreadyExists { entity_set: String, id: String },

    /// The association already exists.
    #[error("link already exists: {0}")]
    LinkAlreadyExists(String),

    /// The association does not exist.
    #[error("link not found: {0}")]
    LinkNotFound(String),

    /// The entity cannot be removed while it still participates in links.
    #[error("entity {entity_set}('{id}') still has {count} link(s)")]
    EntityHasLinks {
        entity_set: String,
        id: String,
        count: usize,
    },

    /// Optimistic concurrency check failed.
    #[error("version conflict on {entity_set}('{id}'): expected {expected}, found {actual}")]
    VersionConflict {
        entity_set: String,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// Invalid input error.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The backend is temporarily refusing work (overloaded or shedding
    /// load). The request may succeed if retried later.
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },

    /// Internal error.
    #[error("internal storage error: {message}")]
    InternalError { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Health status reported by a storage backend.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub latency: Duration,
    pub message: Option<String>,
}
