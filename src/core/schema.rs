//! Explicit entity schemas
//!
//! A schema is the ordered list of property definitions for one entity
//! kind, built once at model-definition time and shared (`Arc`) by every
//! entity instance. There is no global registry and no attribute
//! introspection: whoever needs to decode or encode is handed the schema
//! explicitly.
//!
//! Reference display rules are checked while building; a bad rule is a
//! [`ConfigError`] at startup, never a request-time failure.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::core::error::{ConfigError, StrataResult};
use crate::core::property::PropertyKind;
use crate::core::reference::{DisplayRule, ReferenceConfig};

/// Definition of one named property
#[derive(Debug, Clone)]
pub struct PropertySpec {
    pub name: String,
    pub kind: PropertyKind,
    /// Scalar vs ordered sequence
    pub repeated: bool,
}

/// Ordered property definitions for one entity kind
#[derive(Debug)]
pub struct EntitySchema {
    kind: String,
    properties: IndexMap<String, PropertySpec>,
}

impl EntitySchema {
    /// Start building a schema for the given entity kind
    pub fn builder(kind: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            kind: kind.into(),
            properties: IndexMap::new(),
            error: None,
        }
    }

    /// The entity kind name, e.g. "customer"
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Look up a property definition by name
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.get(name)
    }

    /// All property definitions, in registration order
    pub fn properties(&self) -> impl Iterator<Item = &PropertySpec> {
        self.properties.values()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Builder for [`EntitySchema`].
///
/// Definition errors are latched and surfaced once from `build()`, so
/// schemas can be declared fluently.
pub struct SchemaBuilder {
    kind: String,
    properties: IndexMap<String, PropertySpec>,
    error: Option<ConfigError>,
}

impl SchemaBuilder {
    /// Add a scalar property
    pub fn property(self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.add(name.into(), kind, false)
    }

    /// Add a repeated (ordered sequence) property
    pub fn repeated(self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.add(name.into(), kind, true)
    }

    /// Add a scalar reference property
    pub fn reference(self, name: impl Into<String>, config: ReferenceConfig) -> Self {
        self.add(name.into(), PropertyKind::Reference(config), false)
    }

    /// Add a repeated reference property
    pub fn repeated_reference(self, name: impl Into<String>, config: ReferenceConfig) -> Self {
        self.add(name.into(), PropertyKind::Reference(config), true)
    }

    fn add(mut self, name: String, kind: PropertyKind, repeated: bool) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.properties.contains_key(&name) {
            self.error = Some(ConfigError::DuplicateProperty {
                kind: self.kind.clone(),
                property: name,
            });
            return self;
        }
        if let PropertyKind::Reference(config) = &kind {
            if let Err(e) = check_display_rule(&self.kind, &name, config) {
                self.error = Some(e);
                return self;
            }
        }
        self.properties
            .insert(name.clone(), PropertySpec { name, kind, repeated });
        self
    }

    /// Finish the schema, surfacing any definition error
    pub fn build(self) -> StrataResult<Arc<EntitySchema>> {
        if let Some(error) = self.error {
            return Err(error.into());
        }
        Ok(Arc::new(EntitySchema {
            kind: self.kind,
            properties: self.properties,
        }))
    }
}

// A property display rule must name a string-typed property on the target
// schema; function rules are always acceptable.
fn check_display_rule(
    kind: &str,
    property: &str,
    config: &ReferenceConfig,
) -> Result<(), ConfigError> {
    let name = match &config.display {
        DisplayRule::Function(_) => return Ok(()),
        DisplayRule::Property(name) => name,
    };
    match config.target.property(name) {
        Some(spec) if matches!(spec.kind, PropertyKind::String | PropertyKind::Text) => Ok(()),
        Some(_) => Err(ConfigError::InvalidDisplayRule {
            kind: kind.to_string(),
            property: property.to_string(),
            message: format!("display property '{}' is not string-typed", name),
        }),
        None => Err(ConfigError::InvalidDisplayRule {
            kind: kind.to_string(),
            property: property.to_string(),
            message: format!("no display property '{}' on target '{}'", name, config.target.kind()),
        }),
    }
}
