//! In-memory storage implementation.
//!
//! All data of one store lives in a single `StoreData` value inside a
//! `DashMap` shard, so every operation on a store is atomic with respect to
//! other operations on the same store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::error::{HealthStatus, StorageError, StorageResult};
use crate::traits::{
    validate_entity_id, validate_entity_set_name, validate_store_id, validate_store_name,
    DataStore, EntityQuery, EntityTypeDefinition, Store, StoredEntity, StoredLink,
};

type EntityKey = (String, String);

#[derive(Debug, Default)]
struct StoreData {
    entity_types: HashMap<String, EntityTypeDefinition>,
    entities: HashMap<EntityKey, StoredEntity>,
    links: HashSet<StoredLink>,
}

impl StoreData {
    fn require_entity_type(&self, name: &str) -> StorageResult<&EntityTypeDefinition> {
        self.entity_types
            .get(name)
            .ok_or_else(|| StorageError::EntityTypeNotFound {
                name: name.to_string(),
            })
    }

    fn require_entity(&self, entity_set: &str, id: &str) -> StorageResult<&StoredEntity> {
        self.entities
            .get(&(entity_set.to_string(), id.to_string()))
            .ok_or_else(|| StorageError::EntityNotFound {
                entity_set: entity_set.to_string(),
                id: id.to_string(),
            })
    }

    fn link_count(&self, entity_set: &str, id: &str) -> usize {
        self.links
            .iter()
            .filter(|l| l.involves(entity_set, id))
            .count()
    }
}

fn check_version(entity: &StoredEntity, expected: Option<u64>) -> StorageResult<()> {
    match expected {
        Some(expected) if expected != entity.version => Err(StorageError::VersionConflict {
            entity_set: entity.entity_set.clone(),
            id: entity.id.clone(),
            expected,
            actual: entity.version,
        }),
        _ => Ok(()),
    }
}

/// In-memory implementation of DataStore.
///
/// # Performance Characteristics
///
/// - **Get / insert / replace / delete entity**: O(1) average (HashMap)
/// - **Delete entity**: O(L) where L is the number of links in the store
/// - **List entities**: O(N log N) where N is entities in the store
/// - **Store operations**: O(1) (DashMap lookup)
#[derive(Debug, Default)]
pub struct MemoryDataStore {
    stores: DashMap<String, Store>,
    data: DashMap<String, StoreData>,
}

impl MemoryDataStore {
    /// Creates a new in-memory data store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory data store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn store_data(&self, store_id: &str) -> StorageResult<RefMut<'_, String, StoreData>> {
        self.data
            .get_mut(store_id)
            .ok_or_else(|| StorageError::StoreNotFound {
                store_id: store_id.to_string(),
            })
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn create_store(&self, id: &str, name: &str) -> StorageResult<Store> {
        validate_store_id(id)?;
        validate_store_name(name)?;

        let now = Utc::now();
        let store = Store {
            id: id.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };

        // Use atomic entry API to prevent race condition between check and insert
        use dashmap::mapref::entry::Entry;
        match self.stores.entry(id.to_string()) {
            Entry::Occupied(_) => {
                return Err(StorageError::StoreAlreadyExists {
                    store_id: id.to_string(),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(store.clone());
            }
        }
        self.data.entry(id.to_string()).or_default();

        Ok(store)
    }

    async fn get_store(&self, id: &str) -> StorageResult<Store> {
        self.stores
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| StorageError::StoreNotFound {
                store_id: id.to_string(),
            })
    }

    async fn delete_store(&self, id: &str) -> StorageResult<()> {
        if self.stores.remove(id).is_none() {
            return Err(StorageError::StoreNotFound {
                store_id: id.to_string(),
            });
        }
        self.data.remove(id);
        Ok(())
    }

    async fn list_stores(&self) -> StorageResult<Vec<Store>> {
        let mut stores: Vec<Store> = self.stores.iter().map(|s| s.value().clone()).collect();
        stores.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(stores)
    }

    #[instrument(skip(self, definition), fields(store_id = %store_id, entity_type = %definition.name))]
    async fn create_entity_type(
        &self,
        store_id: &str,
        definition: EntityTypeDefinition,
    ) -> StorageResult<EntityTypeDefinition> {
        validate_entity_set_name(&definition.name)?;
        for target in &definition.navigation_targets {
            validate_entity_set_name(target)?;
        }

        let mut data = self.store_data(store_id)?;
        if data.entity_types.contains_key(&definition.name) {
            return Err(StorageError::EntityTypeAlreadyExists {
                name: definition.name,
            });
        }
        for target in &definition.navigation_targets {
            if target != &definition.name {
                data.require_entity_type(target)?;
            }
        }

        let mut targets = definition.navigation_targets.clone();
        targets.sort();
        targets.dedup();
        for target in &targets {
            if target == &definition.name {
                continue;
            }
            if let Some(other) = data.entity_types.get_mut(target) {
                if !other.has_navigation(&definition.name) {
                    other.navigation_targets.push(definition.name.clone());
                }
            }
        }

        let created = EntityTypeDefinition {
            name: definition.name,
            navigation_targets: targets,
        };
        data.entity_types
            .insert(created.name.clone(), created.clone());
        Ok(created)
    }

    async fn get_entity_type(
        &self,
        store_id: &str,
        name: &str,
    ) -> StorageResult<EntityTypeDefinition> {
        let data = self.store_data(store_id)?;
        data.require_entity_type(name).cloned()
    }

    async fn list_entity_types(&self, store_id: &str) -> StorageResult<Vec<EntityTypeDefinition>> {
        let data = self.store_data(store_id)?;
        let mut types: Vec<EntityTypeDefinition> = data.entity_types.values().cloned().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    #[instrument(skip(self, entity), fields(store_id = %store_id, entity_set = %entity.entity_set, id = %entity.id))]
    async fn insert_entity(
        &self,
        store_id: &str,
        entity: StoredEntity,
    ) -> StorageResult<StoredEntity> {
        validate_entity_id(&entity.id)?;

        let mut data = self.store_data(store_id)?;
        data.require_entity_type(&entity.entity_set)?;

        let key = (entity.entity_set.clone(), entity.id.clone());
        if data.entities.contains_key(&key) {
            return Err(StorageError::EntityAlreadyExists {
                entity_set: entity.entity_set,
                id: entity.id,
            });
        }
        data.entities.insert(key, entity.clone());
        Ok(entity)
    }

    async fn get_entity(
        &self,
        store_id: &str,
        entity_set: &str,
        id: &str,
    ) -> StorageResult<StoredEntity> {
        let data = self.store_data(store_id)?;
        data.require_entity_type(entity_set)?;
        data.require_entity(entity_set, id).cloned()
    }

    async fn list_entities(
        &self,
        store_id: &str,
        entity_set: &str,
        query: &EntityQuery,
    ) -> StorageResult<Vec<StoredEntity>> {
        let data = self.store_data(store_id)?;
        data.require_entity_type(entity_set)?;

        let mut entities: Vec<StoredEntity> = data
            .entities
            .values()
            .filter(|e| e.entity_set == entity_set)
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.published.cmp(&b.published).then_with(|| a.id.cmp(&b.id)));

        let top = query.top.unwrap_or(usize::MAX);
        Ok(entities.into_iter().skip(query.skip).take(top).collect())
    }

    #[instrument(skip(self, properties), fields(store_id = %store_id, entity_set = %entity_set, id = %id))]
    async fn replace_entity(
        &self,
        store_id: &str,
        entity_set: &str,
        id: &str,
        properties: Map<String, Value>,
        expected_version: Option<u64>,
    ) -> StorageResult<StoredEntity> {
        let mut data = self.store_data(store_id)?;
        data.require_entity_type(entity_set)?;
        check_version(data.require_entity(entity_set, id)?, expected_version)?;

        let key = (entity_set.to_string(), id.to_string());
        let entity = data
            .entities
            .get_mut(&key)
            .ok_or_else(|| StorageError::EntityNotFound {
                entity_set: entity_set.to_string(),
                id: id.to_string(),
            })?;
        entity.properties = properties;
        entity.version += 1;
        entity.updated = Utc::now();
        Ok(entity.clone())
    }

    #[instrument(skip(self), fields(store_id = %store_id, entity_set = %entity_set, id = %id))]
    async fn delete_entity(
        &self,
        store_id: &str,
        entity_set: &str,
        id: &str,
        expected_version: Option<u64>,
    ) -> StorageResult<StoredEntity> {
        let mut data = self.store_data(store_id)?;
        data.require_entity_type(entity_set)?;
        check_version(data.require_entity(entity_set, id)?, expected_version)?;

        let count = data.link_count(entity_set, id);
        if count > 0 {
            return Err(StorageError::EntityHasLinks {
                entity_set: entity_set.to_string(),
                id: id.to_string(),
                count,
            });
        }

        data.entities
            .remove(&(entity_set.to_string(), id.to_string()))
            .ok_or_else(|| StorageError::EntityNotFound {
                entity_set: entity_set.to_string(),
                id: id.to_string(),
            })
    }

    #[instrument(skip(self, entity), fields(store_id = %store_id, entity_set = %entity.entity_set, id = %entity.id))]
    async fn restore_entity(
        &self,
        store_id: &str,
        entity: StoredEntity,
        expected_version: Option<u64>,
    ) -> StorageResult<()> {
        let mut data = self.store_data(store_id)?;
        data.require_entity_type(&entity.entity_set)?;

        let key = (entity.entity_set.clone(), entity.id.clone());
        match (data.entities.get(&key), expected_version) {
            (Some(current), Some(_)) => check_version(current, expected_version)?,
            (None, None) => {}
            (Some(current), None) => {
                // Version 0 stands for "absent".
                return Err(StorageError::VersionConflict {
                    entity_set: entity.entity_set,
                    id: entity.id,
                    expected: 0,
                    actual: current.version,
                });
            }
            (None, Some(_)) => {
                return Err(StorageError::EntityNotFound {
                    entity_set: entity.entity_set,
                    id: entity.id,
                });
            }
        }

        data.entities.insert(key, entity);
        Ok(())
    }

    #[instrument(skip(self), fields(store_id = %store_id, link = %link))]
    async fn insert_link(&self, store_id: &str, link: StoredLink) -> StorageResult<()> {
        let mut data = self.store_data(store_id)?;
        data.require_entity(&link.source_set, &link.source_id)?;
        data.require_entity(&link.target_set, &link.target_id)?;

        if data.links.contains(&link) {
            return Err(StorageError::LinkAlreadyExists(link.to_string()));
        }
        data.links.insert(link);
        Ok(())
    }

    async fn delete_link(&self, store_id: &str, link: &StoredLink) -> StorageResult<()> {
        let mut data = self.store_data(store_id)?;
        if !data.links.remove(link) {
            return Err(StorageError::LinkNotFound(link.to_string()));
        }
        Ok(())
    }

    async fn list_links(
        &self,
        store_id: &str,
        entity_set: &str,
        id: &str,
    ) -> StorageResult<Vec<StoredLink>> {
        let data = self.store_data(store_id)?;
        let mut links: Vec<StoredLink> = data
            .links
            .iter()
            .filter(|l| l.involves(entity_set, id))
            .cloned()
            .collect();
        links.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        Ok(links)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        // In-memory storage is always healthy - no external dependencies
        Ok(HealthStatus {
            healthy: true,
            latency: std::time::Duration::ZERO,
            message: Some("in-memory storage".to_string()),
        })
    }
}
