//! The entity model: schema-bound records with dict marshaling
//!
//! An [`Entity`] is a mapping from property name to typed value plus an
//! optional durable [`Key`]. An entity without a key has never been
//! persisted; that state is what drives deferred reference creation during
//! save (see [`crate::core::save`]).

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::core::error::{StrataResult, ValidationError};
use crate::core::key::Key;
use crate::core::property::{PropertyKind, PropertyValue};
use crate::core::schema::EntitySchema;

/// Reserved response field carrying the raw identifier
pub const RESERVED_ID: &str = "$$id$$";
/// Reserved response field carrying the opaque key string
pub const RESERVED_KEY: &str = "$$key$$";

/// A schema-bound record, persisted or in-memory
#[derive(Debug, Clone)]
pub struct Entity {
    schema: Arc<EntitySchema>,
    key: Option<Key>,
    values: IndexMap<String, PropertyValue>,
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.schema.kind() == other.schema.kind()
            && self.key == other.key
            && self.values == other.values
    }
}

impl Entity {
    /// An empty entity of the given schema, all fields unset
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self {
            schema,
            key: None,
            values: IndexMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// The entity kind name
    pub fn kind(&self) -> &str {
        self.schema.kind()
    }

    /// The durable key, present only after a successful save
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    /// Read a property value
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut PropertyValue> {
        self.values.get_mut(name)
    }

    /// Set a property value via the direct API.
    ///
    /// The value is validated against the property's kind and repetition,
    /// same as values arriving from the wire.
    pub fn set(&mut self, name: &str, value: PropertyValue) -> StrataResult<()> {
        let spec = self
            .schema
            .property(name)
            .ok_or_else(|| ValidationError::field(name, "no such property"))?;
        spec.kind.validate(name, spec.repeated, &value)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// The conventional display string, when the schema has a string
    /// property named "display"
    pub fn display(&self) -> Option<&str> {
        self.get("display").and_then(PropertyValue::as_str)
    }

    /// Construct a new entity from a JSON dict.
    ///
    /// Every registered, non-computed property present in the input is
    /// decoded through its property kind. Absent fields stay unset; fields
    /// carrying an explicit null are skipped: in partial-update JSON null
    /// means "leave unspecified", not "clear".
    pub fn from_dict(schema: Arc<EntitySchema>, value: &Value) -> StrataResult<Self> {
        let values = decoded_values(&schema, value)?;
        Ok(Self {
            schema,
            key: None,
            values,
        })
    }

    /// Apply decoded values from a JSON dict onto this entity in place.
    ///
    /// Supports PATCH-like partial updates: only fields actually present
    /// and decodable overwrite existing values, with the same null-skipping
    /// rule as [`Entity::from_dict`].
    pub fn populate_from_dict(&mut self, value: &Value) -> StrataResult<()> {
        let values = decoded_values(&self.schema, value)?;
        for (name, decoded) in values {
            self.values.insert(name, decoded);
        }
        Ok(())
    }

    /// Encode to the canonical JSON dict form.
    ///
    /// All schema properties are emitted in registration order (unset
    /// fields as null). Only an entity with a confirmed key additionally
    /// carries the reserved `$$id$$` and `$$key$$` fields.
    pub fn to_dict(&self) -> Map<String, Value> {
        let mut dict = Map::new();
        for spec in self.schema.properties() {
            let encoded = match self.values.get(&spec.name) {
                Some(value) => value.to_wire(),
                None => Value::Null,
            };
            dict.insert(spec.name.clone(), encoded);
        }
        if let Some(key) = &self.key {
            dict.insert(RESERVED_ID.to_string(), Value::String(key.id.clone()));
            dict.insert(RESERVED_KEY.to_string(), Value::String(key.urlsafe()));
        }
        dict
    }
}

fn decoded_values(
    schema: &Arc<EntitySchema>,
    value: &Value,
) -> StrataResult<IndexMap<String, PropertyValue>> {
    let map = value
        .as_object()
        .ok_or_else(|| ValidationError::shape(schema.kind(), "object", value))?;

    let mut values = IndexMap::new();
    for spec in schema.properties() {
        if matches!(spec.kind, PropertyKind::Computed) {
            continue;
        }
        let raw = match map.get(&spec.name) {
            Some(raw) if !raw.is_null() => raw,
            _ => continue,
        };
        if let Some(decoded) = spec.kind.decode_from_wire(&spec.name, spec.repeated, raw)? {
            values.insert(spec.name.clone(), decoded);
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customer_schema() -> Arc<EntitySchema> {
        EntitySchema::builder("customer")
            .property("name", PropertyKind::String)
            .property("age", PropertyKind::Integer)
            .repeated("tags", PropertyKind::String)
            .property("since", PropertyKind::Date)
            .property("score", PropertyKind::Computed)
            .build()
            .unwrap()
    }

    #[test]
    fn test_from_dict_decodes_known_fields() {
        let entity = Entity::from_dict(
            customer_schema(),
            &json!({ "name": "Ada", "age": "36", "tags": ["vip"], "unknown": 1 }),
        )
        .unwrap();

        assert_eq!(entity.get("name"), Some(&PropertyValue::Str("Ada".into())));
        assert_eq!(entity.get("age"), Some(&PropertyValue::Int(36)));
        assert_eq!(
            entity.get("tags"),
            Some(&PropertyValue::List(vec![PropertyValue::Str("vip".into())]))
        );
        assert!(entity.get("since").is_none());
        assert!(entity.get("unknown").is_none());
    }

    #[test]
    fn test_from_dict_requires_mapping() {
        let err = Entity::from_dict(customer_schema(), &json!(["not", "a", "map"]));
        assert!(err.is_err());
    }

    #[test]
    fn test_from_dict_ignores_computed_fields() {
        let entity =
            Entity::from_dict(customer_schema(), &json!({ "score": 99, "name": "Ada" })).unwrap();
        assert!(entity.get("score").is_none());
    }

    #[test]
    fn test_null_means_unspecified() {
        let mut entity =
            Entity::from_dict(customer_schema(), &json!({ "name": "X", "age": 1 })).unwrap();

        entity.populate_from_dict(&json!({ "name": null })).unwrap();
        assert_eq!(entity.get("name"), Some(&PropertyValue::Str("X".into())));

        entity.populate_from_dict(&json!({ "name": "Y" })).unwrap();
        assert_eq!(entity.get("name"), Some(&PropertyValue::Str("Y".into())));
        // untouched fields survive a partial update
        assert_eq!(entity.get("age"), Some(&PropertyValue::Int(1)));
    }

    #[test]
    fn test_populate_propagates_decode_errors() {
        let mut entity = Entity::new(customer_schema());
        let err = entity.populate_from_dict(&json!({ "age": "not-a-number" }));
        assert!(err.is_err());
    }

    #[test]
    fn test_to_dict_reserved_fields_follow_key() {
        let mut entity =
            Entity::from_dict(customer_schema(), &json!({ "name": "Ada" })).unwrap();

        let dict = entity.to_dict();
        assert!(!dict.contains_key(RESERVED_ID));
        assert!(!dict.contains_key(RESERVED_KEY));

        let key = Key::new("customer", "c-1");
        entity.set_key(key.clone());
        let dict = entity.to_dict();
        assert_eq!(dict.get(RESERVED_ID), Some(&json!("c-1")));
        assert_eq!(dict.get(RESERVED_KEY), Some(&json!(key.urlsafe())));
    }

    #[test]
    fn test_to_dict_emits_unset_fields_as_null() {
        let entity = Entity::from_dict(customer_schema(), &json!({ "name": "Ada" })).unwrap();
        let dict = entity.to_dict();
        assert_eq!(dict.get("age"), Some(&Value::Null));
        assert_eq!(dict.get("since"), Some(&Value::Null));
    }

    #[test]
    fn test_set_validates_kind() {
        let mut entity = Entity::new(customer_schema());
        assert!(entity.set("age", PropertyValue::Int(5)).is_ok());
        assert!(entity
            .set("age", PropertyValue::Str("five".into()))
            .is_err());
        assert!(entity.set("missing", PropertyValue::Int(1)).is_err());
    }

    #[test]
    fn test_structured_property_recurses() {
        let address = EntitySchema::builder("address")
            .property("city", PropertyKind::String)
            .build()
            .unwrap();
        let schema = EntitySchema::builder("customer")
            .property("name", PropertyKind::String)
            .property("address", PropertyKind::Structured(address))
            .build()
            .unwrap();

        let entity = Entity::from_dict(
            schema,
            &json!({ "name": "Ada", "address": { "city": "Bogotá" } }),
        )
        .unwrap();

        match entity.get("address") {
            Some(PropertyValue::Embedded(inner)) => {
                assert_eq!(inner.get("city"), Some(&PropertyValue::Str("Bogotá".into())));
                assert!(inner.key().is_none());
            }
            other => panic!("expected embedded entity, got {:?}", other),
        }
    }

    #[test]
    fn test_display_convention() {
        let schema = EntitySchema::builder("account")
            .property("display", PropertyKind::String)
            .build()
            .unwrap();
        let entity = Entity::from_dict(schema, &json!({ "display": "Acme" })).unwrap();
        assert_eq!(entity.display(), Some("Acme"));
    }
}
