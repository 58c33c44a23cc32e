//! The save protocol: deferred persistence of referenced entities
//!
//! Saving an entity that holds keyless references happens in phases:
//!
//! 1. Pre-save scan: every reference property value (or element, if
//!    repeated) lacking a key is recorded in an explicit worklist of
//!    [`PendingReference`] locations. The worklist is a plain value
//!    threaded through the save, not state stashed on the entity.
//! 2. The owner is written; it now has a confirmed key. Resolution never
//!    starts earlier because child targets are parented under that key.
//! 3. Post-save resolution: each pending target is created. The creates
//!    are independent asynchronous writes, issued concurrently and awaited
//!    collectively; any failure fails the whole save. A reference whose
//!    config forbids creation (`allow_new = false`) and is still keyless is
//!    a fatal [`StrataError::UnresolvedReference`]; the owner write is not
//!    rolled back, but the error always propagates.
//! 4. If any reference was newly created, the owner is re-saved exactly
//!    once so the durable record carries the minted keys. Already-resolved
//!    references are left untouched, which keeps the re-save idempotent.

use futures::future::try_join_all;

use crate::core::entity::Entity;
use crate::core::error::{StrataError, StrataResult};
use crate::core::key::Key;
use crate::core::property::{PropertyKind, PropertyValue};
use crate::core::reference::{ReferenceConfig, ReferenceValue};
use crate::core::store::DocumentStore;

/// Location of one unresolved reference on an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReference {
    pub property: String,
    /// Element index when the property is repeated
    pub index: Option<usize>,
}

/// Pre-save scan: locations of every keyless reference value.
///
/// Pure and store-free, so the protocol is testable without a live store.
pub fn pending_references(entity: &Entity) -> Vec<PendingReference> {
    let mut pending = Vec::new();
    for spec in entity.schema().properties() {
        if !matches!(spec.kind, PropertyKind::Reference(_)) {
            continue;
        }
        match entity.get(&spec.name) {
            Some(PropertyValue::Reference(value)) if !value.is_resolved() => {
                pending.push(PendingReference {
                    property: spec.name.clone(),
                    index: None,
                });
            }
            Some(PropertyValue::List(items)) => {
                for (index, item) in items.iter().enumerate() {
                    if let PropertyValue::Reference(value) = item {
                        if !value.is_resolved() {
                            pending.push(PendingReference {
                                property: spec.name.clone(),
                                index: Some(index),
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }
    pending
}

/// Save an entity, running the full deferred-reference protocol.
///
/// Returns the owner's durable key. On success the in-memory entity
/// reflects every minted reference key.
pub async fn save(store: &dyn DocumentStore, entity: &mut Entity) -> StrataResult<Key> {
    let pending = pending_references(entity);

    let key = store.put(entity).await?;
    entity.set_key(key.clone());

    if pending.is_empty() {
        return Ok(key);
    }

    tracing::debug!(
        kind = entity.kind(),
        pending = pending.len(),
        "resolving deferred references"
    );
    let resolved_any = resolve_references(store, entity, &pending).await?;
    if resolved_any {
        // one re-save, never one per reference
        store.put(entity).await?;
        tracing::debug!(kind = entity.kind(), "owner re-saved with resolved references");
    }
    Ok(key)
}

/// Post-save step: create every pending target and patch minted keys into
/// the owning entity's reference values.
///
/// Requires the owner to already hold a confirmed key. Returns whether any
/// reference was newly resolved (and the owner therefore needs a re-save).
pub async fn resolve_references(
    store: &dyn DocumentStore,
    entity: &mut Entity,
    pending: &[PendingReference],
) -> StrataResult<bool> {
    let owner_key = entity
        .key()
        .cloned()
        .ok_or_else(|| StrataError::Internal("resolve_references before owner save".into()))?;
    let owner_kind = entity.kind().to_string();

    // Validate the whole worklist before touching any value, so a failure
    // leaves every reference exactly as it was.
    for location in pending {
        let config = reference_config(entity, &location.property)?;
        let still_keyless = reference_value(entity, location)
            .is_some_and(|value| !value.is_resolved());
        if still_keyless && (!config.allow_new || !has_pending(entity, location)) {
            return Err(StrataError::UnresolvedReference {
                kind: owner_kind,
                property: location.property.clone(),
            });
        }
    }

    // Phase one: pull out each still-keyless target and pre-assign its key.
    struct Creation {
        location: PendingReference,
        target: Entity,
        display: String,
    }
    let mut creations = Vec::new();

    for location in pending {
        let config = reference_config(entity, &location.property)?;
        let Some(value) = reference_value_mut(entity, location) else {
            continue;
        };
        if value.is_resolved() {
            continue;
        }
        let Some(mut target) = value.take_pending() else {
            continue;
        };
        let target_key = if config.is_child {
            Key::minted_child_of(&owner_key, target.kind())
        } else {
            Key::minted(target.kind())
        };
        target.set_key(target_key);
        let display = config.display_for(&target);
        creations.push(Creation {
            location: location.clone(),
            target,
            display,
        });
    }

    if creations.is_empty() {
        return Ok(false);
    }

    // Phase two: issue the creates concurrently and await them all. Any
    // failure propagates and fails the save.
    let keys = try_join_all(creations.iter().map(|c| store.put(&c.target))).await?;

    // Phase three: patch the minted keys back into the in-memory values.
    for (creation, key) in creations.into_iter().zip(keys) {
        if let Some(value) = reference_value_mut(entity, &creation.location) {
            value.mark_resolved(&key, creation.display);
        }
    }
    Ok(true)
}

/// Backfill display snapshots for references that arrived with a key but no
/// display, reading the live target through the store.
pub async fn backfill_displays(store: &dyn DocumentStore, entity: &mut Entity) -> StrataResult<()> {
    let mut patches: Vec<(PendingReference, String)> = Vec::new();

    for spec in entity.schema().properties() {
        let PropertyKind::Reference(config) = &spec.kind else {
            continue;
        };
        match entity.get(&spec.name) {
            Some(PropertyValue::Reference(value)) => {
                if let Some(display) = fetched_display(store, config, value).await? {
                    patches.push((
                        PendingReference {
                            property: spec.name.clone(),
                            index: None,
                        },
                        display,
                    ));
                }
            }
            Some(PropertyValue::List(items)) => {
                for (index, item) in items.iter().enumerate() {
                    if let PropertyValue::Reference(value) = item {
                        if let Some(display) = fetched_display(store, config, value).await? {
                            patches.push((
                                PendingReference {
                                    property: spec.name.clone(),
                                    index: Some(index),
                                },
                                display,
                            ));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    for (location, display) in patches {
        if let Some(value) = reference_value_mut(entity, &location) {
            value.display = display;
        }
    }
    Ok(())
}

async fn fetched_display(
    store: &dyn DocumentStore,
    config: &ReferenceConfig,
    value: &ReferenceValue,
) -> StrataResult<Option<String>> {
    if !value.is_resolved() || !value.display.is_empty() {
        return Ok(None);
    }
    let not_found = || StrataError::NotFound {
        kind: config.target.kind().to_string(),
        lookup: value.key.clone(),
    };
    let key = Key::from_urlsafe(&value.key).map_err(|_| not_found())?;
    let target = store.get(&key).await?.ok_or_else(not_found)?;
    Ok(Some(config.display_for(&target)))
}

fn reference_config(entity: &Entity, property: &str) -> StrataResult<ReferenceConfig> {
    match entity.schema().property(property).map(|spec| &spec.kind) {
        Some(PropertyKind::Reference(config)) => Ok(config.clone()),
        _ => Err(StrataError::Internal(format!(
            "pending reference on non-reference property '{}'",
            property
        ))),
    }
}

fn reference_value<'a>(
    entity: &'a Entity,
    location: &PendingReference,
) -> Option<&'a ReferenceValue> {
    let value = entity.get(&location.property)?;
    match (value, location.index) {
        (PropertyValue::Reference(reference), None) => Some(reference),
        (PropertyValue::List(items), Some(index)) => match items.get(index) {
            Some(PropertyValue::Reference(reference)) => Some(reference),
            _ => None,
        },
        _ => None,
    }
}

fn has_pending(entity: &Entity, location: &PendingReference) -> bool {
    reference_value(entity, location).is_some_and(|value| value.pending().is_some())
}

fn reference_value_mut<'a>(
    entity: &'a mut Entity,
    location: &PendingReference,
) -> Option<&'a mut ReferenceValue> {
    let value = entity.get_mut(&location.property)?;
    match (value, location.index) {
        (PropertyValue::Reference(reference), None) => Some(reference),
        (PropertyValue::List(items), Some(index)) => match items.get_mut(index) {
            Some(PropertyValue::Reference(reference)) => Some(reference),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::EntitySchema;
    use serde_json::json;
    use std::sync::Arc;

    fn account_schema() -> Arc<EntitySchema> {
        EntitySchema::builder("account")
            .property("display", PropertyKind::String)
            .build()
            .unwrap()
    }

    fn invoice_schema(config: ReferenceConfig) -> Arc<EntitySchema> {
        EntitySchema::builder("invoice")
            .property("amount", PropertyKind::Float)
            .reference("account", config)
            .build()
            .unwrap()
    }

    #[test]
    fn test_scan_finds_keyless_scalar_reference() {
        let schema = invoice_schema(ReferenceConfig::new(account_schema()));
        let entity = Entity::from_dict(
            schema,
            &json!({ "amount": 10.0, "account": { "display": "Acme" } }),
        )
        .unwrap();

        let pending = pending_references(&entity);
        assert_eq!(
            pending,
            vec![PendingReference {
                property: "account".to_string(),
                index: None,
            }]
        );
    }

    #[test]
    fn test_scan_skips_resolved_references() {
        let schema = invoice_schema(ReferenceConfig::new(account_schema()));
        let entity = Entity::from_dict(
            schema,
            &json!({ "account": { "urlsafe_key": "abc", "display": "Acme" } }),
        )
        .unwrap();
        assert!(pending_references(&entity).is_empty());
    }

    #[test]
    fn test_scan_indexes_repeated_elements() {
        let schema = EntitySchema::builder("invoice")
            .repeated_reference("accounts", ReferenceConfig::new(account_schema()))
            .build()
            .unwrap();
        let entity = Entity::from_dict(
            schema,
            &json!({ "accounts": [
                { "urlsafe_key": "abc", "display": "A" },
                { "display": "B" },
                { "display": "C" },
            ]}),
        )
        .unwrap();

        let indexes: Vec<Option<usize>> = pending_references(&entity)
            .into_iter()
            .map(|p| p.index)
            .collect();
        assert_eq!(indexes, vec![Some(1), Some(2)]);
    }
}
