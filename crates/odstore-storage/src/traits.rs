//! DataStore trait definition.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HealthStatus, StorageError, StorageResult};

/// Maximum length of a store ID.
pub const MAX_STORE_ID_LENGTH: usize = 128;
/// Maximum length of a store name.
pub const MAX_STORE_NAME_LENGTH: usize = 256;
/// Maximum length of an entity set name.
pub const MAX_ENTITY_SET_NAME_LENGTH: usize = 128;
/// Maximum length of an entity key.
pub const MAX_ENTITY_ID_LENGTH: usize = 200;

/// Store metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Schema object describing one entity set and its associations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeDefinition {
    pub name: String,
    /// Entity sets reachable through a `_<name>` navigation property.
    #[serde(default)]
    pub navigation_targets: Vec<String>,
}

impl EntityTypeDefinition {
    /// Returns true if `target` is reachable from this type.
    pub fn has_navigation(&self, target: &str) -> bool {
        self.navigation_targets.iter().any(|t| t == target)
    }
}

/// A stored entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    pub entity_set: String,
    pub id: String,
    /// User properties, without the reserved `__` fields.
    pub properties: Map<String, Value>,
    /// Optimistic concurrency token, incremented on every replace.
    pub version: u64,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl StoredEntity {
    /// Creates a new version-1 entity stamped with the current time.
    pub fn new(
        entity_set: impl Into<String>,
        id: impl Into<String>,
        properties: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_set: entity_set.into(),
            id: id.into(),
            properties,
            version: 1,
            published: now,
            updated: now,
        }
    }
}

/// An association between two entities.
///
/// Links are undirected: the constructor orders the two ends so that
/// `(a, b)` and `(b, a)` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredLink {
    pub source_set: String,
    pub source_id: String,
    pub target_set: String,
    pub target_id: String,
}

impl StoredLink {
    pub fn new(
        a_set: impl Into<String>,
        a_id: impl Into<String>,
        b_set: impl Into<String>,
        b_id: impl Into<String>,
    ) -> Self {
        let a = (a_set.into(), a_id.into());
        let b = (b_set.into(), b_id.into());
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            source_set: first.0,
            source_id: first.1,
            target_set: second.0,
            target_id: second.1,
        }
    }

    /// Returns true if either end of the link is `(entity_set, id)`.
    pub fn involves(&self, entity_set: &str, id: &str) -> bool {
        (self.source_set == entity_set && self.source_id == id)
            || (self.target_set == entity_set && self.target_id == id)
    }
}

impl fmt::Display for StoredLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}('{}') <-> {}('{}')",
            self.source_set, self.source_id, self.target_set, self.target_id
        )
    }
}

/// Paging options for listing entities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityQuery {
    pub top: Option<usize>,
    pub skip: usize,
}

/// Validates a store ID.
pub fn validate_store_id(id: &str) -> StorageResult<()> {
    validate_name("store id", id, MAX_STORE_ID_LENGTH)
}

/// Validates a store name.
pub fn validate_store_name(name: &str) -> StorageResult<()> {
    validate_name("store name", name, MAX_STORE_NAME_LENGTH)
}

/// Validates an entity set name: ASCII letters, digits, `_` and `-`,
/// starting with a letter or digit.
pub fn validate_entity_set_name(name: &str) -> StorageResult<()> {
    validate_name("entity set name", name, MAX_ENTITY_SET_NAME_LENGTH)?;
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    if !valid_start
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(StorageError::InvalidInput {
            message: format!("invalid entity set name: {name}"),
        });
    }
    Ok(())
}

/// Validates an entity key.
pub fn validate_entity_id(id: &str) -> StorageResult<()> {
    validate_name("entity id", id, MAX_ENTITY_ID_LENGTH)
}

fn validate_name(what: &str, value: &str, max_len: usize) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidInput {
            message: format!("{what} cannot be empty"),
        });
    }
    if value.len() > max_len {
        return Err(StorageError::InvalidInput {
            message: format!("{what} exceeds maximum length of {max_len}"),
        });
    }
    if value.chars().any(char::is_control) {
        return Err(StorageError::InvalidInput {
            message: format!("{what} contains control characters"),
        });
    }
    Ok(())
}

/// Abstract storage interface for tenant data.
///
/// Implementations must be thread-safe (Send + Sync) and support
/// async operations. Every data operation is scoped to a store.
#[async_trait]
pub trait DataStore: Send + Sync + 'static {
    // Store operations

    /// Creates a new store.
    async fn create_store(&self, id: &str, name: &str) -> StorageResult<Store>;

    /// Gets a store by ID.
    async fn get_store(&self, id: &str) -> StorageResult<Store>;

    /// Deletes a store together with its schema, entities and links.
    async fn delete_store(&self, id: &str) -> StorageResult<()>;

    /// Lists all stores.
    async fn list_stores(&self) -> StorageResult<Vec<Store>>;

    // Schema operations

    /// Creates an entity type. Every navigation target must already exist
    /// (or be the type itself); the association is recorded on both sides.
    async fn create_entity_type(
        &self,
        store_id: &str,
        definition: EntityTypeDefinition,
    ) -> StorageResult<EntityTypeDefinition>;

    /// Gets an entity type by name.
    async fn get_entity_type(
        &self,
        store_id: &str,
        name: &str,
    ) -> StorageResult<EntityTypeDefinition>;

    /// Lists entity types, ordered by name.
    async fn list_entity_types(&self, store_id: &str) -> StorageResult<Vec<EntityTypeDefinition>>;

    // Entity operations

    /// Inserts a new entity. Fails if the key is already taken.
    async fn insert_entity(&self, store_id: &str, entity: StoredEntity)
        -> StorageResult<StoredEntity>;

    /// Gets an entity by key.
    async fn get_entity(
        &self,
        store_id: &str,
        entity_set: &str,
        id: &str,
    ) -> StorageResult<StoredEntity>;

    /// Lists entities of a set ordered by publish time, then key.
    async fn list_entities(
        &self,
        store_id: &str,
        entity_set: &str,
        query: &EntityQuery,
    ) -> StorageResult<Vec<StoredEntity>>;

    /// Replaces the user properties of an entity.
    ///
    /// When `expected_version` is set it must match the stored version.
    async fn replace_entity(
        &self,
        store_id: &str,
        entity_set: &str,
        id: &str,
        properties: Map<String, Value>,
        expected_version: Option<u64>,
    ) -> StorageResult<StoredEntity>;

    /// Deletes an entity and returns what was removed.
    async fn delete_entity(
        &self,
        store_id: &str,
        entity_set: &str,
        id: &str,
        expected_version: Option<u64>,
    ) -> StorageResult<StoredEntity>;

    /// Writes an entity verbatim to put back a previous state when a
    /// mutation is compensated.
    ///
    /// With `Some(version)` the entity must currently exist at exactly that
    /// version. With `None` the key must currently be absent. Anything else
    /// means another writer got there first and fails with `VersionConflict`.
    async fn restore_entity(
        &self,
        store_id: &str,
        entity: StoredEntity,
        expected_version: Option<u64>,
    ) -> StorageResult<()>;

    // Link operations

    /// Inserts a link. Both ends must exist.
    async fn insert_link(&self, store_id: &str, link: StoredLink) -> StorageResult<()>;

    /// Deletes a link.
    async fn delete_link(&self, store_id: &str, link: &StoredLink) -> StorageResult<()>;

    /// Lists the links that involve the given entity.
    async fn list_links(
        &self,
        store_id: &str,
        entity_set: &str,
        id: &str,
    ) -> StorageResult<Vec<StoredLink>>;

    // Health

    /// Reports backend health.
    async fn health_check(&self) -> StorageResult<HealthStatus>;
}
