//! In-memory implementation of DocumentStore for testing and development

use async_trait::async_trait;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::core::entity::Entity;
use crate::core::error::{StorageError, StrataResult};
use crate::core::key::Key;
use crate::core::property::PropertyValue;
use crate::core::query::{Filter, Ordering};
use crate::core::store::DocumentStore;

/// In-memory document store
///
/// Useful for testing and development. Uses RwLock for thread-safe access;
/// entities are indexed by their urlsafe key.
#[derive(Clone)]
pub struct InMemoryStore {
    entities: Arc<RwLock<HashMap<String, Entity>>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            entities: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn unavailable() -> StorageError {
        StorageError::Unavailable {
            backend: "in-memory".to_string(),
            message: "lock poisoned".to_string(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Equality against a stored value; a repeated value matches when any
/// element equals the filter value.
fn matches(stored: Option<&PropertyValue>, filter: &Filter) -> bool {
    match stored {
        Some(PropertyValue::List(items)) => items.iter().any(|item| item == &filter.value),
        Some(value) => value == &filter.value,
        None => false,
    }
}

fn compare_by(a: &Entity, b: &Entity, order: &[Ordering]) -> CmpOrdering {
    for ordering in order {
        let left = a.get(&ordering.property);
        let right = b.get(&ordering.property);
        // unset values sort first
        let outcome = match (left, right) {
            (None, None) => CmpOrdering::Equal,
            (None, Some(_)) => CmpOrdering::Less,
            (Some(_), None) => CmpOrdering::Greater,
            (Some(l), Some(r)) => l.compare(r).unwrap_or(CmpOrdering::Equal),
        };
        let outcome = if ordering.descending {
            outcome.reverse()
        } else {
            outcome
        };
        if outcome != CmpOrdering::Equal {
            return outcome;
        }
    }
    CmpOrdering::Equal
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, key: &Key) -> StrataResult<Option<Entity>> {
        let entities = self.entities.read().map_err(|_| Self::unavailable())?;
        Ok(entities.get(&key.urlsafe()).cloned())
    }

    async fn get_by_id(&self, kind: &str, id: &str) -> StrataResult<Option<Entity>> {
        let entities = self.entities.read().map_err(|_| Self::unavailable())?;
        Ok(entities
            .values()
            .find(|entity| {
                entity.kind() == kind && entity.key().is_some_and(|key| key.id == id)
            })
            .cloned())
    }

    async fn put(&self, entity: &Entity) -> StrataResult<Key> {
        let key = match entity.key() {
            Some(key) => key.clone(),
            None => Key::minted(entity.kind()),
        };
        let mut stored = entity.clone();
        stored.set_key(key.clone());

        let mut entities = self.entities.write().map_err(|_| Self::unavailable())?;
        entities.insert(key.urlsafe(), stored);
        Ok(key)
    }

    async fn query(
        &self,
        kind: &str,
        filters: &[Filter],
        order: &[Ordering],
    ) -> StrataResult<Vec<Entity>> {
        let entities = self.entities.read().map_err(|_| Self::unavailable())?;
        let mut results: Vec<Entity> = entities
            .values()
            .filter(|entity| {
                entity.kind() == kind
                    && filters
                        .iter()
                        .all(|filter| matches(entity.get(&filter.property), filter))
            })
            .cloned()
            .collect();
        drop(entities);

        results.sort_by(|a, b| compare_by(a, b, order));
        Ok(results)
    }

    async fn delete(&self, key: &Key) -> StrataResult<()> {
        let mut entities = self.entities.write().map_err(|_| Self::unavailable())?;
        entities.remove(&key.urlsafe());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::property::PropertyKind;
    use crate::core::schema::EntitySchema;
    use serde_json::json;

    fn customer_schema() -> Arc<EntitySchema> {
        EntitySchema::builder("customer")
            .property("name", PropertyKind::String)
            .property("age", PropertyKind::Integer)
            .repeated("tags", PropertyKind::String)
            .build()
            .unwrap()
    }

    fn customer(name: &str, age: i64, tags: &[&str]) -> Entity {
        Entity::from_dict(
            customer_schema(),
            &json!({ "name": name, "age": age, "tags": tags }),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_put_mints_key_and_get_round_trips() {
        let store = InMemoryStore::new();
        let entity = customer("Ada", 36, &[]);

        let key = store.put(&entity).await.unwrap();
        assert_eq!(key.kind, "customer");

        let fetched = store.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched.get("name"), entity.get("name"));
        assert_eq!(fetched.key(), Some(&key));
    }

    #[tokio::test]
    async fn test_put_respects_preassigned_key() {
        let store = InMemoryStore::new();
        let mut entity = customer("Ada", 36, &[]);
        entity.set_key(Key::new("customer", "ada"));

        let key = store.put(&entity).await.unwrap();
        assert_eq!(key.id, "ada");

        let fetched = store.get_by_id("customer", "ada").await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn test_put_respects_child_keys() {
        let store = InMemoryStore::new();
        let parent = Key::new("customer", "ada");
        let mut entity = customer("Ada Jr", 3, &[]);
        entity.set_key(Key::minted_child_of(&parent, "customer"));

        let key = store.put(&entity).await.unwrap();
        assert_eq!(key.parent.as_deref(), Some(&parent));
    }

    #[tokio::test]
    async fn test_get_by_id_matches_kind() {
        let store = InMemoryStore::new();
        let mut entity = customer("Ada", 36, &[]);
        entity.set_key(Key::new("customer", "42"));
        store.put(&entity).await.unwrap();

        assert!(store.get_by_id("customer", "42").await.unwrap().is_some());
        assert!(store.get_by_id("supplier", "42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_filters_by_equality() {
        let store = InMemoryStore::new();
        store.put(&customer("Ada", 36, &[])).await.unwrap();
        store.put(&customer("Grace", 45, &[])).await.unwrap();

        let filters = vec![Filter {
            property: "name".to_string(),
            value: PropertyValue::Str("Grace".to_string()),
        }];
        let results = store.query("customer", &filters, &[]).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get("age"), Some(&PropertyValue::Int(45)));
    }

    #[tokio::test]
    async fn test_query_repeated_property_matches_any_element() {
        let store = InMemoryStore::new();
        store.put(&customer("Ada", 36, &["vip", "early"])).await.unwrap();
        store.put(&customer("Grace", 45, &["staff"])).await.unwrap();

        let filters = vec![Filter {
            property: "tags".to_string(),
            value: PropertyValue::Str("vip".to_string()),
        }];
        let results = store.query("customer", &filters, &[]).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].get("name"),
            Some(&PropertyValue::Str("Ada".to_string()))
        );
    }

    #[tokio::test]
    async fn test_query_orders_results() {
        let store = InMemoryStore::new();
        store.put(&customer("Ada", 36, &[])).await.unwrap();
        store.put(&customer("Grace", 45, &[])).await.unwrap();
        store.put(&customer("Edsger", 28, &[])).await.unwrap();

        let results = store
            .query("customer", &[], &[Ordering::desc("age")])
            .await
            .unwrap();
        let ages: Vec<_> = results
            .iter()
            .map(|e| e.get("age").cloned())
            .collect();
        assert_eq!(
            ages,
            vec![
                Some(PropertyValue::Int(45)),
                Some(PropertyValue::Int(36)),
                Some(PropertyValue::Int(28)),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_removes_entity() {
        let store = InMemoryStore::new();
        let key = store.put(&customer("Ada", 36, &[])).await.unwrap();

        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }
}
