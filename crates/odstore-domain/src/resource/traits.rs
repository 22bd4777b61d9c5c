//! Storage operations needed by [`EntityResource`](super::EntityResource).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::DomainResult;
use crate::model::EntityLink;

/// An entity as seen by resource operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub entity_set: String,
    pub key: String,
    pub properties: Map<String, Value>,
    pub version: u64,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Entity {
    /// Creates a new version-1 entity stamped with the current time.
    pub fn new(
        entity_set: impl Into<String>,
        key: impl Into<String>,
        properties: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_set: entity_set.into(),
            key: key.into(),
            properties,
            version: 1,
            published: now,
            updated: now,
        }
    }

    /// Weak entity tag derived from the version and update time.
    pub fn etag(&self) -> String {
        format!("W/\"{}-{}\"", self.version, self.updated.timestamp_millis())
    }
}

/// Schema information about one entity set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeInfo {
    pub name: String,
    pub navigation_targets: Vec<String>,
}

impl EntityTypeInfo {
    pub fn has_navigation(&self, target: &str) -> bool {
        self.navigation_targets.iter().any(|t| t == target)
    }
}

/// Trait for entity storage operations needed by resource operations.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// Gets the schema of an entity set.
    async fn get_entity_type(&self, store_id: &str, name: &str) -> DomainResult<EntityTypeInfo>;

    /// Inserts a new entity; the key must be free.
    async fn insert_entity(&self, store_id: &str, entity: Entity) -> DomainResult<Entity>;

    /// Gets an entity by key.
    async fn get_entity(&self, store_id: &str, entity_set: &str, key: &str)
        -> DomainResult<Entity>;

    /// Lists entities of a set in publish order.
    async fn list_entities(
        &self,
        store_id: &str,
        entity_set: &str,
        top: Option<usize>,
        skip: usize,
    ) -> DomainResult<Vec<Entity>>;

    /// Replaces the user properties of an entity.
    async fn replace_entity(
        &self,
        store_id: &str,
        entity_set: &str,
        key: &str,
        properties: Map<String, Value>,
        expected_version: Option<u64>,
    ) -> DomainResult<Entity>;

    /// Deletes an entity and returns it.
    async fn delete_entity(
        &self,
        store_id: &str,
        entity_set: &str,
        key: &str,
        expected_version: Option<u64>,
    ) -> DomainResult<Entity>;

    /// Puts an entity back verbatim.
    ///
    /// `Some(version)` requires the current entity to be at that version;
    /// `None` requires the key to be absent. A mismatch is a
    /// [`DomainError::VersionConflict`](crate::DomainError::VersionConflict).
    async fn restore_entity(
        &self,
        store_id: &str,
        entity: Entity,
        expected_version: Option<u64>,
    ) -> DomainResult<()>;

    async fn insert_link(&self, store_id: &str, link: &EntityLink) -> DomainResult<()>;

    async fn delete_link(&self, store_id: &str, link: &EntityLink) -> DomainResult<()>;
}
