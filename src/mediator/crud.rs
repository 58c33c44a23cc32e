//! Generic CRUD mediator over one entity schema
//!
//! The mediator is schema-driven and entity-agnostic: bind it to a schema,
//! a store, a fixed result ordering, and optional hooks, and it serves the
//! four CRUD operations for that kind. Operations return a status code and
//! a JSON body; the HTTP layer above decides routing and transport.
//!
//! Lookup precedence in `get`, `put`, and `delete`: an opaque `key`
//! parameter wins, then a raw `id`, then (for `get` only) the remaining
//! parameters become permissive equality filters.

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::entity::{Entity, RESERVED_ID, RESERVED_KEY};
use crate::core::error::{RequestError, StrataError, StrataResult};
use crate::core::key::Key;
use crate::core::query::{FilterSet, Ordering};
use crate::core::save::{backfill_displays, save};
use crate::core::schema::EntitySchema;
use crate::core::store::DocumentStore;

/// Extension points around the CRUD operations.
///
/// Every method has a no-op default; implementors override only what they
/// need. `delete` is the deletion strategy itself, so overriding it swaps
/// hard deletion for archival or any other policy.
#[async_trait]
pub trait CrudHooks: Send + Sync {
    async fn before_fetch(&self) -> StrataResult<()> {
        Ok(())
    }

    /// Runs on every fetched result set before it is marshaled
    async fn after_fetch(&self, _entities: &mut Vec<Entity>) -> StrataResult<()> {
        Ok(())
    }

    async fn before_create(&self, _entity: &mut Entity) -> StrataResult<()> {
        Ok(())
    }

    async fn after_create(&self, _entity: &Entity) -> StrataResult<()> {
        Ok(())
    }

    async fn before_update(&self, _entity: &mut Entity) -> StrataResult<()> {
        Ok(())
    }

    async fn after_update(&self, _entity: &Entity) -> StrataResult<()> {
        Ok(())
    }

    async fn before_delete(&self, _entity: &Entity) -> StrataResult<()> {
        Ok(())
    }

    async fn after_delete(&self, _entity: &Entity) -> StrataResult<()> {
        Ok(())
    }

    /// The deletion strategy; defaults to a hard store delete
    async fn delete(&self, store: &dyn DocumentStore, entity: &Entity) -> StrataResult<()> {
        match entity.key() {
            Some(key) => store.delete(key).await,
            None => Ok(()),
        }
    }
}

/// The default hook set: every extension point is a no-op
pub struct NoHooks;

#[async_trait]
impl CrudHooks for NoHooks {}

/// CRUD operations for one entity kind
#[derive(Clone)]
pub struct CrudMediator {
    schema: Arc<EntitySchema>,
    store: Arc<dyn DocumentStore>,
    ordering: Vec<Ordering>,
    hooks: Arc<dyn CrudHooks>,
}

impl CrudMediator {
    pub fn new(schema: Arc<EntitySchema>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            schema,
            store,
            ordering: Vec::new(),
            hooks: Arc::new(NoHooks),
        }
    }

    /// Fixed ordering applied to every list response
    pub fn with_ordering(mut self, ordering: Vec<Ordering>) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn CrudHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// Fetch by `key`, by `id`, or by permissive equality filters.
    ///
    /// Key and id lookups answer with a single object; the filter path
    /// always answers with an array, empty included.
    pub async fn get(
        &self,
        params: &HashMap<String, String>,
    ) -> StrataResult<(StatusCode, Value)> {
        self.hooks.before_fetch().await?;

        if let Some(urlsafe) = params.get("key") {
            let entity = self.entity_by_key(urlsafe).await?;
            let entity = self.fetched_single(entity).await?;
            return Ok((StatusCode::OK, Value::Object(entity.to_dict())));
        }
        if let Some(id) = params.get("id") {
            let entity = self.entity_by_id(id).await?;
            let entity = self.fetched_single(entity).await?;
            return Ok((StatusCode::OK, Value::Object(entity.to_dict())));
        }

        let set = FilterSet::from_params(&self.schema, params);
        if set.ignored > 0 {
            tracing::debug!(
                kind = self.schema.kind(),
                ignored = set.ignored,
                "query dropped unusable filter parameters"
            );
        }
        let mut entities = self
            .store
            .query(self.schema.kind(), &set.filters, &self.ordering)
            .await?;
        self.hooks.after_fetch(&mut entities).await?;

        let body = entities
            .iter()
            .map(|entity| Value::Object(entity.to_dict()))
            .collect();
        Ok((StatusCode::OK, Value::Array(body)))
    }

    /// Create an entity from a request body.
    ///
    /// Reserved fields are stripped from the body first, so clients cannot
    /// smuggle a key into a create. Hooks may pre-assign a key; creating
    /// over an existing identifier is a conflict.
    pub async fn post(&self, body: &Value) -> StrataResult<(StatusCode, Value)> {
        let body = stripped_body(body)?;
        let mut entity = Entity::from_dict(Arc::clone(&self.schema), &body)?;
        self.hooks.before_create(&mut entity).await?;

        if let Some(key) = entity.key() {
            if self.store.get(key).await?.is_some() {
                return Err(StrataError::DuplicateIdentifier {
                    kind: self.schema.kind().to_string(),
                    id: key.id.clone(),
                });
            }
        }

        backfill_displays(self.store.as_ref(), &mut entity).await?;
        save(self.store.as_ref(), &mut entity).await?;
        self.hooks.after_create(&entity).await?;

        tracing::info!(kind = self.schema.kind(), "entity created");
        Ok((StatusCode::OK, Value::Object(entity.to_dict())))
    }

    /// Partially update the entity named by `key` or `id`.
    ///
    /// Only fields present in the body overwrite; explicit nulls leave the
    /// stored value untouched.
    pub async fn put(
        &self,
        params: &HashMap<String, String>,
        body: &Value,
    ) -> StrataResult<(StatusCode, Value)> {
        let mut entity = self.entity_by_params(params).await?;
        entity.populate_from_dict(body)?;
        self.hooks.before_update(&mut entity).await?;

        backfill_displays(self.store.as_ref(), &mut entity).await?;
        save(self.store.as_ref(), &mut entity).await?;
        self.hooks.after_update(&entity).await?;

        tracing::info!(kind = self.schema.kind(), "entity updated");
        Ok((StatusCode::OK, Value::Object(entity.to_dict())))
    }

    /// Delete the entity named by `key` or `id`, via the hook strategy
    pub async fn delete(
        &self,
        params: &HashMap<String, String>,
    ) -> StrataResult<(StatusCode, Value)> {
        let entity = self.entity_by_params(params).await?;
        self.hooks.before_delete(&entity).await?;
        self.hooks.delete(self.store.as_ref(), &entity).await?;
        self.hooks.after_delete(&entity).await?;

        tracing::info!(kind = self.schema.kind(), "entity deleted");
        Ok((StatusCode::OK, json!({ "success": true })))
    }

    async fn entity_by_params(&self, params: &HashMap<String, String>) -> StrataResult<Entity> {
        if let Some(urlsafe) = params.get("key") {
            return self.entity_by_key(urlsafe).await;
        }
        if let Some(id) = params.get("id") {
            return self.entity_by_id(id).await;
        }
        Err(StrataError::Request(RequestError::MissingKeyOrId))
    }

    async fn entity_by_key(&self, urlsafe: &str) -> StrataResult<Entity> {
        let not_found = || StrataError::NotFound {
            kind: self.schema.kind().to_string(),
            lookup: urlsafe.to_string(),
        };
        // a malformed opaque key names nothing, same outcome as an unknown one
        let key = Key::from_urlsafe(urlsafe).map_err(|_| not_found())?;
        self.store.get(&key).await?.ok_or_else(not_found)
    }

    async fn entity_by_id(&self, id: &str) -> StrataResult<Entity> {
        self.store
            .get_by_id(self.schema.kind(), id)
            .await?
            .ok_or_else(|| StrataError::NotFound {
                kind: self.schema.kind().to_string(),
                lookup: id.to_string(),
            })
    }

    async fn fetched_single(&self, entity: Entity) -> StrataResult<Entity> {
        let mut entities = vec![entity];
        self.hooks.after_fetch(&mut entities).await?;
        entities
            .pop()
            .ok_or_else(|| StrataError::Internal("after_fetch dropped the result".into()))
    }
}

/// Body must be a JSON object; reserved marshaling fields are removed
fn stripped_body(body: &Value) -> StrataResult<Value> {
    let Value::Object(map) = body else {
        return Err(StrataError::Request(RequestError::InvalidBody {
            message: "request body must be a JSON object".to_string(),
        }));
    };
    let stripped: Map<String, Value> = map
        .iter()
        .filter(|(name, _)| name.as_str() != RESERVED_ID && name.as_str() != RESERVED_KEY)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    Ok(Value::Object(stripped))
}
