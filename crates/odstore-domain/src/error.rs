//! Domain error types for resource operations.

use thiserror::Error;

/// Domain-specific errors.
///
/// Repository implementations map their backend errors onto these variants;
/// `EntityResource` turns them into per-request [`OperationFailure`]s.
///
/// [`OperationFailure`]: crate::model::OperationFailure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// Method token is not one of GET/POST/PUT/DELETE.
    #[error("invalid method: {method}")]
    InvalidMethod { method: String },

    /// Resource path does not match the OData path grammar.
    #[error("invalid resource path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// Store not found.
    #[error("store not found: {store_id}")]
    StoreNotFound { store_id: String },

    /// Entity set not found.
    #[error("entity set not found: {name}")]
    EntityTypeNotFound { name: String },

    /// Entity not found.
    #[error("entity not found: {entity_set}('{id}')")]
    EntityNotFound { entity_set: String, id: String },

    /// Entity key already taken.
    #[error("entity already exists: {entity_set}('{id}')")]
    EntityAlreadyExists { entity_set: String, id: String },

    /// Link already exists.
    #[error("link already exists: {link}")]
    LinkAlreadyExists { link: String },

    /// Link not found.
    #[error("link not found: {link}")]
    LinkNotFound { link: String },

    /// Entity still participates in links.
    #[error("entity {entity_set}('{id}') is still linked")]
    EntityHasLinks { entity_set: String, id: String },

    /// Optimistic concurrency token mismatch.
    #[error("version conflict on {entity_set}('{id}')")]
    VersionConflict { entity_set: String, id: String },

    /// Input rejected by the backend.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Backend is saturated; the caller may retry later.
    #[error("backend unavailable: {message}")]
    Unavailable { message: String },

    /// Unexpected backend failure.
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
