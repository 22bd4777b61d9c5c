//! Adapters that bridge the storage layer to the domain layer.
//!
//! The domain layer (odstore-domain) defines `EntityRepository`, the storage
//! operations `EntityResource` needs. The storage layer (odstore-storage)
//! implements `DataStore` with concrete backends. This module implements the
//! former on top of the latter, so the HTTP routes and the `$batch`
//! processor can run against any backend.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use odstore_domain::error::{DomainError, DomainResult};
use odstore_domain::{Entity, EntityLink, EntityRepository, EntityTypeInfo};
use odstore_storage::{DataStore, EntityQuery, StorageError, StoredEntity, StoredLink};

/// Maps a storage error onto the domain error vocabulary.
pub fn to_domain_error(err: StorageError) -> DomainError {
    match err {
        StorageError::StoreNotFound { store_id } => DomainError::StoreNotFound { store_id },
        StorageError::EntityTypeNotFound { name } => DomainError::EntityTypeNotFound { name },
        StorageError::EntityNotFound { entity_set, id } => {
            DomainError::EntityNotFound { entity_set, id }
        }
        StorageError::EntityAlreadyExists { entity_set, id } => {
            DomainError::EntityAlreadyExists { entity_set, id }
        }
        StorageError::LinkAlreadyExists(link) => DomainError::LinkAlreadyExists { link },
        StorageError::LinkNotFound(link) => DomainError::LinkNotFound { link },
        StorageError::EntityHasLinks { entity_set, id, .. } => {
            DomainError::EntityHasLinks { entity_set, id }
        }
        StorageError::VersionConflict { entity_set, id, .. } => {
            DomainError::VersionConflict { entity_set, id }
        }
        StorageError::InvalidInput { message } => DomainError::InvalidInput { message },
        err @ (StorageError::StoreAlreadyExists { .. }
        | StorageError::EntityTypeAlreadyExists { .. }) => DomainError::InvalidInput {
            message: err.to_string(),
        },
        StorageError::Unavailable { message } => DomainError::Unavailable { message },
        StorageError::InternalError { message } => DomainError::Internal { message },
    }
}

fn to_entity(stored: StoredEntity) -> Entity {
    Entity {
        entity_set: stored.entity_set,
        key: stored.id,
        properties: stored.properties,
        version: stored.version,
        published: stored.published,
        updated: stored.updated,
    }
}

fn to_stored(entity: Entity) -> StoredEntity {
    StoredEntity {
        entity_set: entity.entity_set,
        id: entity.key,
        properties: entity.properties,
        version: entity.version,
        published: entity.published,
        updated: entity.updated,
    }
}

fn to_stored_link(link: &EntityLink) -> StoredLink {
    StoredLink::new(
        link.source_set.as_str(),
        link.source_key.as_str(),
        link.target_set.as_str(),
        link.target_key.as_str(),
    )
}

/// Adapter that implements `EntityRepository` using a `DataStore`.
pub struct DataStoreEntityRepository<S: DataStore> {
    storage: Arc<S>,
}

impl<S: DataStore> DataStoreEntityRepository<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: DataStore> EntityRepository for DataStoreEntityRepository<S> {
    async fn get_entity_type(&self, store_id: &str, name: &str) -> DomainResult<EntityTypeInfo> {
        let definition = self
            .storage
            .get_entity_type(store_id, name)
            .await
            .map_err(to_domain_error)?;
        Ok(EntityTypeInfo {
            name: definition.name,
            navigation_targets: definition.navigation_targets,
        })
    }

    async fn insert_entity(&self, store_id: &str, entity: Entity) -> DomainResult<Entity> {
        self.storage
            .insert_entity(store_id, to_stored(entity))
            .await
            .map(to_entity)
            .map_err(to_domain_error)
    }

    async fn get_entity(
        &self,
        store_id: &str,
        entity_set: &str,
        key: &str,
    ) -> DomainResult<Entity> {
        self.storage
            .get_entity(store_id, entity_set, key)
            .await
            .map(to_entity)
            .map_err(to_domain_error)
    }

    async fn list_entities(
        &self,
        store_id: &str,
        entity_set: &str,
        top: Option<usize>,
        skip: usize,
    ) -> DomainResult<Vec<Entity>> {
        let query = EntityQuery { top, skip };
        let entities = self
            .storage
            .list_entities(store_id, entity_set, &query)
            .await
            .map_err(to_domain_error)?;
        Ok(entities.into_iter().map(to_entity).collect())
    }

    async fn replace_entity(
        &self,
        store_id: &str,
        entity_set: &str,
        key: &str,
        properties: Map<String, Value>,
        expected_version: Option<u64>,
    ) -> DomainResult<Entity> {
        self.storage
            .replace_entity(store_id, entity_set, key, properties, expected_version)
            .await
            .map(to_entity)
            .map_err(to_domain_error)
    }

    async fn delete_entity(
        &self,
        store_id: &str,
        entity_set: &str,
        key: &str,
        expected_version: Option<u64>,
    ) -> DomainResult<Entity> {
        self.storage
            .delete_entity(store_id, entity_set, key, expected_version)
            .await
            .map(to_entity)
            .map_err(to_domain_error)
    }

    async fn restore_entity(
        &self,
        store_id: &str,
        entity: Entity,
        expected_version: Option<u64>,
    ) -> DomainResult<()> {
        self.storage
            .restore_entity(store_id, to_stored(entity), expected_version)
            .await
            .map_err(to_domain_error)
    }

    async fn insert_link(&self, store_id: &str, link: &EntityLink) -> DomainResult<()> {
        self.storage
            .insert_link(store_id, to_stored_link(link))
            .await
            .map_err(to_domain_error)
    }

    async fn delete_link(&self, store_id: &str, link: &EntityLink) -> DomainResult<()> {
        self.storage
            .delete_link(store_id, &to_stored_link(link))
            .await
            .map_err(to_domain_error)
    }
}
