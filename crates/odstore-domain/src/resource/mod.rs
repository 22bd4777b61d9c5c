//! Resource operations: the contract the `$batch` engine dispatches to, and
//! its entity-backed implementation.

mod entity;
pub mod json;
mod traits;


use async_trait::async_trait;

pub use entity::EntityResource;
pub use traits::{Entity, EntityRepository, EntityTypeInfo};

use crate::index::InBatchEntityIndex;
use crate::model::{AppliedMutation, OperationFailure, OperationResult, ResourceRequest};

/// Per-call context handed to every resource operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    pub store_id: String,
    /// Base URI of the OData service, used for `Location` and `__metadata`.
    pub base_uri: String,
}

impl OperationContext {
    pub fn new(store_id: impl Into<String>, base_uri: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            base_uri: base_uri.into(),
        }
    }

    /// Absolute URI of an entity, e.g. `/stores/s1/odata/Sales('k')`.
    pub fn entity_uri(&self, entity_set: &str, key: &str) -> String {
        format!(
            "{}/{}('{}')",
            self.base_uri.trim_end_matches('/'),
            entity_set,
            key.replace('\'', "''")
        )
    }
}

/// The Resource Operation API consumed by the batch processor.
///
/// `execute` performs one create/read/update/delete/link request. It may
/// consult the batch's [`InBatchEntityIndex`] but never modifies it; the
/// caller records the returned [`AppliedMutation`]. `undo` compensates a
/// mutation previously returned by `execute`.
#[async_trait]
pub trait ResourceOperations: Send + Sync {
    async fn execute(
        &self,
        ctx: &OperationContext,
        request: &ResourceRequest,
        index: &InBatchEntityIndex,
    ) -> OperationResult;

    async fn undo(
        &self,
        ctx: &OperationContext,
        mutation: &AppliedMutation,
    ) -> Result<(), OperationFailure>;
}
