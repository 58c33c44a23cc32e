//! The document store seam
//!
//! The core is agnostic to the backing store: anything that can fetch by
//! key or id, upsert with key minting, run equality-filtered ordered
//! queries, and delete. Writes are per-entity atomic; the save protocol in
//! [`crate::core::save`] relies on that and on its own single re-save being
//! idempotent.

use async_trait::async_trait;

use crate::core::entity::Entity;
use crate::core::error::StrataResult;
use crate::core::key::Key;
use crate::core::query::{Filter, Ordering};

/// Abstract key-value document store with transactional single-entity writes
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one entity by key
    async fn get(&self, key: &Key) -> StrataResult<Option<Entity>>;

    /// Fetch one entity of `kind` by its raw identifier
    async fn get_by_id(&self, kind: &str, id: &str) -> StrataResult<Option<Entity>>;

    /// Persist an entity, minting a key when it has none yet.
    ///
    /// A pre-assigned key (including child keys carrying a parent) is
    /// respected as-is. Returns the durable key.
    async fn put(&self, entity: &Entity) -> StrataResult<Key>;

    /// Equality-filtered, ordered query over one kind
    async fn query(
        &self,
        kind: &str,
        filters: &[Filter],
        order: &[Ordering],
    ) -> StrataResult<Vec<Entity>>;

    /// Hard-delete one entity
    async fn delete(&self, key: &Key) -> StrataResult<()>;
}
