//! odstore-domain: OData resource model and operations
//!
//! This crate contains the resource-level logic shared by the HTTP surface
//! and the `$batch` engine:
//! - Request model (method, resource path grammar, headers)
//! - Typed execution outcomes and failures
//! - The batch-scoped in-batch entity index
//! - The `ResourceOperations` contract and its entity-backed implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               odstore-domain                │
//! ├─────────────────────────────────────────────┤
//! │  model/     - Method, paths, outcomes       │
//! │  index.rs   - In-batch entity index         │
//! │  resource/  - ResourceOperations + entities │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod index;
pub mod model;
pub mod resource;

// Re-export commonly used types at the crate root
pub use error::{DomainError, DomainResult};
pub use index::{EntityState, InBatchEntityIndex};
pub use model::{
    codes, AppliedMutation, EntityLink, Executed, ExecutionOutcome, HeaderList, Method,
    OperationFailure, OperationResult, PathShape, ResourcePath, ResourceRequest,
};
pub use resource::{
    Entity, EntityRepository, EntityResource, EntityTypeInfo, OperationContext,
    ResourceOperations,
};
