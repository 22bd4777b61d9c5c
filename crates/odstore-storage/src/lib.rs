//! odstore-storage: Storage abstraction layer
//!
//! This crate provides the tenant-scoped document store used by odstore:
//! - DataStore trait for store, schema, entity and link operations
//! - In-memory implementation backed by `DashMap`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              odstore-storage                │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - DataStore trait definition   │
//! │  memory.rs   - In-memory implementation     │
//! │  error.rs    - StorageError                 │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use error::{HealthStatus, StorageError, StorageResult};
pub use memory::MemoryDataStore;
pub use traits::{
    DataStore, EntityQuery, EntityTypeDefinition, Store, StoredEntity, StoredLink,
};
