//! Reference values: lightweight, displayable pointers to other entities
//!
//! A reference stores a cached display projection of the target plus its
//! opaque key. The display is a snapshot taken when the reference was built
//! or resolved; it is never re-synced automatically.
//!
//! When the target does not exist yet, the reference instead carries the
//! full unsaved target entity (off the wire format) until the enclosing
//! save creates it; see [`crate::core::save`].

use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::core::entity::{Entity, RESERVED_KEY};
use crate::core::error::{StrataResult, ValidationError};
use crate::core::key::Key;
use crate::core::schema::EntitySchema;

/// How to derive the display string from a target entity
#[derive(Clone)]
pub enum DisplayRule {
    /// Read a string-typed property by name (checked at schema build time)
    Property(String),
    /// Compute the display with a pure function of the target
    Function(Arc<dyn Fn(&Entity) -> String + Send + Sync>),
}

impl fmt::Debug for DisplayRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayRule::Property(name) => write!(f, "Property({:?})", name),
            DisplayRule::Function(_) => write!(f, "Function(..)"),
        }
    }
}

/// Configuration of one reference property
#[derive(Debug, Clone)]
pub struct ReferenceConfig {
    /// Schema of the referenced entity kind
    pub target: Arc<EntitySchema>,

    /// Display rule; defaults to a property literally named "display"
    pub display: DisplayRule,

    /// Parent newly created targets under the owner's key
    pub is_child: bool,

    /// Permit creating not-yet-existing targets during save.
    /// When false, a keyless reference at save time is a fatal error.
    pub allow_new: bool,
}

impl ReferenceConfig {
    pub fn new(target: Arc<EntitySchema>) -> Self {
        Self {
            target,
            display: DisplayRule::Property("display".to_string()),
            is_child: true,
            allow_new: true,
        }
    }

    /// Use a named string property of the target as the display
    pub fn with_display_property(mut self, name: impl Into<String>) -> Self {
        self.display = DisplayRule::Property(name.into());
        self
    }

    /// Use a function of the target entity as the display
    pub fn with_display_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Entity) -> String + Send + Sync + 'static,
    {
        self.display = DisplayRule::Function(Arc::new(f));
        self
    }

    /// Create new targets standalone instead of parented under the owner
    pub fn standalone(mut self) -> Self {
        self.is_child = false;
        self
    }

    /// Forbid creation; references must name an existing target
    pub fn require_existing(mut self) -> Self {
        self.allow_new = false;
        self
    }

    /// Compute the display string for a target entity
    pub fn display_for(&self, target: &Entity) -> String {
        match &self.display {
            DisplayRule::Property(name) => target
                .get(name)
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_string(),
            DisplayRule::Function(f) => f(target),
        }
    }
}

/// The stored value of a reference property
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceValue {
    /// Opaque key of the target; empty while unresolved
    pub key: String,

    /// Cached display snapshot of the target
    pub display: String,

    // Full unsaved target awaiting creation; never serialized.
    pending: Option<Box<Entity>>,
}

impl ReferenceValue {
    /// A reference to an already-persisted target
    pub fn resolved(key: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display: display.into(),
            pending: None,
        }
    }

    /// A reference carrying an unsaved target entity
    pub fn unsaved(target: Entity) -> Self {
        Self {
            key: String::new(),
            display: String::new(),
            pending: Some(Box::new(target)),
        }
    }

    /// Build a resolved reference from a persisted target entity
    pub fn to_entity(config: &ReferenceConfig, target: &Entity) -> Self {
        let key = target.key().map(Key::urlsafe).unwrap_or_default();
        Self::resolved(key, config.display_for(target))
    }

    /// Whether this reference names a persisted target
    pub fn is_resolved(&self) -> bool {
        !self.key.is_empty()
    }

    /// The unsaved target, when one is pending
    pub fn pending(&self) -> Option<&Entity> {
        self.pending.as_deref()
    }

    /// Take the pending target out, leaving the reference keyless
    pub(crate) fn take_pending(&mut self) -> Option<Entity> {
        self.pending.take().map(|boxed| *boxed)
    }

    /// Patch in the minted key and display after the target was created
    pub(crate) fn mark_resolved(&mut self, key: &Key, display: String) {
        self.key = key.urlsafe();
        self.display = display;
    }

    /// Decode a reference from its wire form.
    ///
    /// Accepts either `{"urlsafe_key"|"$$key$$": .., "display": ..}` naming
    /// an existing target, or a full nested object decoded as an unsaved
    /// target of the configured kind.
    pub fn decode_from_wire(
        config: &ReferenceConfig,
        name: &str,
        raw: &Value,
    ) -> StrataResult<Self> {
        let map = raw
            .as_object()
            .ok_or_else(|| ValidationError::shape(name, "object", raw))?;

        let key = wire_key(map);
        if key.is_empty() {
            let target = Entity::from_dict(config.target.clone(), raw)?;
            return Ok(Self::unsaved(target));
        }

        let display = map
            .get("display")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(Self::resolved(key, display))
    }

    /// Encode to the compact wire projection.
    ///
    /// Always `{"urlsafe_key", "display"}`, never the full target, keeping
    /// responses small and non-recursive.
    pub fn encode_to_wire(&self) -> Value {
        json!({
            "urlsafe_key": self.key,
            "display": self.display,
        })
    }
}

fn wire_key(map: &Map<String, Value>) -> String {
    map.get("urlsafe_key")
        .or_else(|| map.get(RESERVED_KEY))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::property::PropertyKind;

    fn account_schema() -> Arc<EntitySchema> {
        EntitySchema::builder("account")
            .property("display", PropertyKind::String)
            .property("email", PropertyKind::String)
            .build()
            .unwrap()
    }

    #[test]
    fn test_decode_existing_target_roundtrips_exactly() {
        let config = ReferenceConfig::new(account_schema());
        let raw = json!({ "display": "Acme", "urlsafe_key": "abc123" });
        let reference = ReferenceValue::decode_from_wire(&config, "account", &raw).unwrap();

        assert!(reference.is_resolved());
        assert_eq!(
            reference.encode_to_wire(),
            json!({ "urlsafe_key": "abc123", "display": "Acme" })
        );
    }

    #[test]
    fn test_decode_accepts_dollar_key_spelling() {
        let config = ReferenceConfig::new(account_schema());
        let raw = json!({ "$$key$$": "abc123", "display": "Acme" });
        let reference = ReferenceValue::decode_from_wire(&config, "account", &raw).unwrap();
        assert_eq!(reference.key, "abc123");
    }

    #[test]
    fn test_decode_nested_object_holds_unsaved_target() {
        let config = ReferenceConfig::new(account_schema());
        let raw = json!({ "display": "Acme", "email": "acme@example.com" });
        let reference = ReferenceValue::decode_from_wire(&config, "account", &raw).unwrap();

        assert!(!reference.is_resolved());
        let pending = reference.pending().expect("pending target");
        assert_eq!(pending.kind(), "account");
        assert_eq!(
            pending.get("email").and_then(|v| v.as_str()),
            Some("acme@example.com")
        );
    }

    #[test]
    fn test_decode_non_object_fails() {
        let config = ReferenceConfig::new(account_schema());
        let err = ReferenceValue::decode_from_wire(&config, "account", &json!("abc123"));
        assert!(err.is_err());
    }

    #[test]
    fn test_encode_never_emits_pending_target() {
        let config = ReferenceConfig::new(account_schema());
        let raw = json!({ "display": "Acme", "email": "acme@example.com" });
        let reference = ReferenceValue::decode_from_wire(&config, "account", &raw).unwrap();
        assert_eq!(
            reference.encode_to_wire(),
            json!({ "urlsafe_key": "", "display": "" })
        );
    }

    #[test]
    fn test_display_for_property_rule() {
        let config = ReferenceConfig::new(account_schema());
        let mut target = Entity::new(account_schema());
        target
            .set("display", crate::core::property::PropertyValue::Str("Acme".into()))
            .unwrap();
        assert_eq!(config.display_for(&target), "Acme");
    }

    #[test]
    fn test_display_for_function_rule() {
        let config =
            ReferenceConfig::new(account_schema()).with_display_fn(|e| format!("<{}>", e.kind()));
        let target = Entity::new(account_schema());
        assert_eq!(config.display_for(&target), "<account>");
    }
}
