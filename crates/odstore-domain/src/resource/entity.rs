//! Entity-backed implementation of [`ResourceOperations`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use ulid::Ulid;

use super::json::{self, ID_FIELD};
use super::{Entity, EntityRepository, OperationContext, ResourceOperations};
use crate::index::{EntityState, InBatchEntityIndex};
use crate::model::{
    AppliedMutation, EntityLink, Executed, ExecutionOutcome, Method, OperationFailure,
    OperationResult, PathShape, ResourcePath, ResourceRequest,
};

const DATA_SERVICE_VERSION: &str = "2.0";

/// Executes OData requests against an [`EntityRepository`].
pub struct EntityResource<R> {
    repository: Arc<R>,
}

impl<R> Clone for EntityResource<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: EntityRepository> EntityResource<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    fn entity_outcome(status: u16, ctx: &OperationContext, entity: &Entity) -> ExecutionOutcome {
        ExecutionOutcome::new(status)
            .with_json(&json::results(json::entity_json(ctx, entity)))
            .with_header("ETag", entity.etag())
            .with_header("DataServiceVersion", DATA_SERVICE_VERSION)
    }

    /// Fetches an entity, treating keys deleted earlier in the batch as absent.
    async fn existing(
        &self,
        ctx: &OperationContext,
        index: &InBatchEntityIndex,
        entity_set: &str,
        key: &str,
    ) -> Result<Entity, OperationFailure> {
        if index.state(entity_set, key) == Some(EntityState::Deleted) {
            return Err(OperationFailure::no_such_entity(entity_set, key));
        }
        Ok(self
            .repository
            .get_entity(&ctx.store_id, entity_set, key)
            .await?)
    }

    /// Inserts a new entity built from a request body.
    async fn insert_from_body(
        &self,
        ctx: &OperationContext,
        index: &InBatchEntityIndex,
        entity_set: &str,
        body: &[u8],
    ) -> Result<Entity, OperationFailure> {
        self.repository
            .get_entity_type(&ctx.store_id, entity_set)
            .await?;

        let mut properties = json::parse_object(body)?;
        if let Some(field) = json::reserved_field(&properties) {
            return Err(OperationFailure::request_field_format(field));
        }
        let key = match properties.remove(ID_FIELD) {
            None => Ulid::new().to_string(),
            Some(Value::String(key)) if !key.is_empty() => key,
            Some(_) => return Err(OperationFailure::request_field_format(ID_FIELD)),
        };

        index.check_create(entity_set, &key)?;
        let entity = Entity::new(entity_set, key, properties);
        Ok(self
            .repository
            .insert_entity(&ctx.store_id, entity)
            .await?)
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        index: &InBatchEntityIndex,
        entity_set: &str,
        body: &[u8],
    ) -> OperationResult {
        let entity = self.insert_from_body(ctx, index, entity_set, body).await?;
        let outcome = Self::entity_outcome(201, ctx, &entity)
            .with_header("Location", ctx.entity_uri(entity_set, &entity.key));
        Ok(Executed::mutated(
            outcome,
            AppliedMutation::Created {
                entity_set: entity.entity_set,
                key: entity.key,
            },
        ))
    }

    async fn create_via_navigation(
        &self,
        ctx: &OperationContext,
        index: &InBatchEntityIndex,
        source: (&str, &str),
        target: &str,
        body: &[u8],
    ) -> OperationResult {
        let (source_set, source_key) = source;
        let source_type = self
            .repository
            .get_entity_type(&ctx.store_id, source_set)
            .await?;
        if !source_type.has_navigation(target) {
            return Err(OperationFailure::no_such_navprop(source_set, target));
        }
        self.existing(ctx, index, source_set, source_key).await?;

        let entity = self.insert_from_body(ctx, index, target, body).await?;
        let link = EntityLink::new(source_set, source_key, target, &entity.key);
        if let Err(e) = self.repository.insert_link(&ctx.store_id, &link).await {
            if let Err(undo_err) = self
                .repository
                .delete_entity(&ctx.store_id, target, &entity.key, None)
                .await
            {
                warn!(error = %undo_err, entity_set = target, key = %entity.key, "failed to remove entity after link failure");
            }
            return Err(e.into());
        }

        let outcome = Self::entity_outcome(201, ctx, &entity)
            .with_header("Location", ctx.entity_uri(target, &entity.key));
        Ok(Executed::mutated(
            outcome,
            AppliedMutation::CreatedViaNavigation {
                entity_set: entity.entity_set,
                key: entity.key,
                link,
            },
        ))
    }

    async fn create_link(
        &self,
        ctx: &OperationContext,
        index: &InBatchEntityIndex,
        source: (&str, &str),
        target: &str,
        body: &[u8],
    ) -> OperationResult {
        let (source_set, source_key) = source;
        let source_type = self
            .repository
            .get_entity_type(&ctx.store_id, source_set)
            .await?;
        if !source_type.has_navigation(target) {
            return Err(OperationFailure::no_such_navprop(source_set, target));
        }

        let object = json::parse_object(body)?;
        let uri = object
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| OperationFailure::request_field_format("uri"))?;
        let target_key = match uri.rsplit('/').next().map(ResourcePath::parse) {
            Some(Ok(ResourcePath::Entity { entity_set, key })) if entity_set == target => key,
            _ => return Err(OperationFailure::request_field_format("uri")),
        };

        self.existing(ctx, index, source_set, source_key).await?;
        self.existing(ctx, index, target, &target_key).await?;

        let link = EntityLink::new(source_set, source_key, target, target_key);
        self.repository.insert_link(&ctx.store_id, &link).await?;

        let outcome =
            ExecutionOutcome::new(204).with_header("DataServiceVersion", DATA_SERVICE_VERSION);
        Ok(Executed::mutated(outcome, AppliedMutation::Linked { link }))
    }

    async fn read(
        &self,
        ctx: &OperationContext,
        index: &InBatchEntityIndex,
        entity_set: &str,
        key: &str,
    ) -> OperationResult {
        self.repository
            .get_entity_type(&ctx.store_id, entity_set)
            .await?;
        let entity = self.existing(ctx, index, entity_set, key).await?;
        Ok(Executed::read(Self::entity_outcome(200, ctx, &entity)))
    }

    async fn list(
        &self,
        ctx: &OperationContext,
        request: &ResourceRequest,
        entity_set: &str,
    ) -> OperationResult {
        let top = parse_count(request, "$top")?;
        let skip = parse_count(request, "$skip")?.unwrap_or(0);

        let entities = self
            .repository
            .list_entities(&ctx.store_id, entity_set, top, skip)
            .await?;
        let results: Vec<Value> = entities
            .iter()
            .map(|entity| json::entity_json(ctx, entity))
            .collect();

        let outcome = ExecutionOutcome::new(200)
            .with_json(&json::results(Value::Array(results)))
            .with_header("DataServiceVersion", DATA_SERVICE_VERSION);
        Ok(Executed::read(outcome))
    }

    async fn replace(
        &self,
        ctx: &OperationContext,
        index: &InBatchEntityIndex,
        request: &ResourceRequest,
        entity_set: &str,
        key: &str,
    ) -> OperationResult {
        self.repository
            .get_entity_type(&ctx.store_id, entity_set)
            .await?;
        let current = self.existing(ctx, index, entity_set, key).await?;
        if !json::if_match_satisfied(request.headers.get("If-Match"), &current.etag()) {
            return Err(OperationFailure::etag_not_match());
        }

        let mut properties = json::parse_object(&request.body)?;
        if let Some(field) = json::reserved_field(&properties) {
            return Err(OperationFailure::request_field_format(field));
        }
        match properties.remove(ID_FIELD) {
            None => {}
            Some(Value::String(id)) if id == key => {}
            Some(_) => return Err(OperationFailure::request_field_format(ID_FIELD)),
        }

        let updated = self
            .repository
            .replace_entity(
                &ctx.store_id,
                entity_set,
                key,
                properties,
                Some(current.version),
            )
            .await?;

        let outcome = ExecutionOutcome::new(204)
            .with_header("ETag", updated.etag())
            .with_header("DataServiceVersion", DATA_SERVICE_VERSION);
        Ok(Executed::mutated(
            outcome,
            AppliedMutation::Replaced { previous: current },
        ))
    }

    async fn delete(
        &self,
        ctx: &OperationContext,
        index: &InBatchEntityIndex,
        request: &ResourceRequest,
        entity_set: &str,
        key: &str,
    ) -> OperationResult {
        self.repository
            .get_entity_type(&ctx.store_id, entity_set)
            .await?;
        let current = self.existing(ctx, index, entity_set, key).await?;
        if !json::if_match_satisfied(request.headers.get("If-Match"), &current.etag()) {
            return Err(OperationFailure::etag_not_match());
        }

        let previous = self
            .repository
            .delete_entity(&ctx.store_id, entity_set, key, Some(current.version))
            .await?;

        let outcome =
            ExecutionOutcome::new(204).with_header("DataServiceVersion", DATA_SERVICE_VERSION);
        Ok(Executed::mutated(outcome, AppliedMutation::Deleted { previous }))
    }
}

/// Parses a non-negative integer query option.
fn parse_count(request: &ResourceRequest, option: &str) -> Result<Option<usize>, OperationFailure> {
    match request.query_option(option) {
        None => Ok(None),
        Some(value) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|_| OperationFailure::query_parse(option)),
    }
}

#[async_trait]
impl<R: EntityRepository + 'static> ResourceOperations for EntityResource<R> {
    async fn execute(
        &self,
        ctx: &OperationContext,
        request: &ResourceRequest,
        index: &InBatchEntityIndex,
    ) -> OperationResult {
        debug!(method = %request.method, path = %request.path, "executing resource request");

        match (request.method, &request.path) {
            (Method::Get, ResourcePath::Collection { entity_set }) => {
                self.list(ctx, request, entity_set).await
            }
            (Method::Get, ResourcePath::Entity { entity_set, key }) => {
                self.read(ctx, index, entity_set, key).await
            }
            (Method::Post, ResourcePath::Collection { entity_set }) => {
                self.create(ctx, index, entity_set, &request.body).await
            }
            (
                Method::Post,
                ResourcePath::Navigation {
                    entity_set,
                    key,
                    target,
                    target_key,
                },
            ) => {
                if target_key.is_some() {
                    return Err(OperationFailure::key_for_navprop());
                }
                self.create_via_navigation(ctx, index, (entity_set, key), target, &request.body)
                    .await
            }
            (
                Method::Post,
                ResourcePath::Links {
                    entity_set,
                    key,
                    target,
                    target_key,
                },
            ) => {
                if target_key.is_some() {
                    return Err(OperationFailure::key_for_navprop());
                }
                self.create_link(ctx, index, (entity_set, key), target, &request.body)
                    .await
            }
            (Method::Put, ResourcePath::Entity { entity_set, key }) => {
                self.replace(ctx, index, request, entity_set, key).await
            }
            (Method::Delete, ResourcePath::Entity { entity_set, key }) => {
                self.delete(ctx, index, request, entity_set, key).await
            }
            (Method::Get | Method::Put | Method::Delete, path)
                if matches!(path.shape(), PathShape::Navigation | PathShape::Links) =>
            {
                Err(OperationFailure::method_not_implemented())
            }
            _ => Err(OperationFailure::method_not_allowed()),
        }
    }

    async fn undo(
        &self,
        ctx: &OperationContext,
        mutation: &AppliedMutation,
    ) -> Result<(), OperationFailure> {
        let store_id = &ctx.store_id;
        match mutation {
            AppliedMutation::Created { entity_set, key } => {
                self.repository
                    .delete_entity(store_id, entity_set, key, None)
                    .await?;
            }
            AppliedMutation::CreatedViaNavigation {
                entity_set,
                key,
                link,
            } => {
                // Both steps run even if the first fails, so the target
                // entity is not left behind.
                let unlinked = self.repository.delete_link(store_id, link).await;
                let deleted = self
                    .repository
                    .delete_entity(store_id, entity_set, key, None)
                    .await;
                unlinked?;
                deleted?;
            }
            AppliedMutation::Replaced { previous } => {
                // The replace bumped the version by one; anything newer is
                // another writer's commit and must not be overwritten.
                self.repository
                    .restore_entity(store_id, previous.clone(), Some(previous.version + 1))
                    .await?;
            }
            AppliedMutation::Deleted { previous } => {
                self.repository
                    .restore_entity(store_id, previous.clone(), None)
                    .await?;
            }
            AppliedMutation::Linked { link } => {
                self.repository.delete_link(store_id, link).await?;
            }
        }
        Ok(())
    }
}
