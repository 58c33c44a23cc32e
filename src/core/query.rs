//! Query filters and ordering
//!
//! Filters are built permissively from request parameters: any parameter
//! matching a property name is equality-filtered after decoding through
//! that property's wire conversion; anything unrecognized or unconvertible
//! is dropped. The drop is deliberate (matching the permissive behavior
//! clients rely on) but observable: [`FilterSet::ignored`] counts it and a
//! debug log names each dropped parameter.

use serde_json::Value;
use std::collections::HashMap;

use crate::core::property::PropertyValue;
use crate::core::schema::EntitySchema;

/// Equality filter on one property
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub property: String,
    pub value: PropertyValue,
}

/// Sort order on one property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub property: String,
    pub descending: bool,
}

impl Ordering {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            descending: false,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            descending: true,
        }
    }

    /// Parse `"field"`, `"field:asc"` or `"field:desc"`
    pub fn parse(expr: &str) -> Self {
        match expr.split_once(':') {
            Some((property, "desc")) => Self::desc(property),
            Some((property, _)) => Self::asc(property),
            None => Self::asc(expr),
        }
    }
}

/// The outcome of permissive filter construction
#[derive(Debug, Default)]
pub struct FilterSet {
    pub filters: Vec<Filter>,
    /// Number of parameters dropped as unknown or unconvertible
    pub ignored: usize,
}

/// Parameter names the mediator consumes itself, never filterable
const RESERVED_PARAMS: &[&str] = &["key", "id"];

impl FilterSet {
    /// Build equality filters from request parameters.
    ///
    /// Parameters naming no property, naming a computed property, or whose
    /// value fails the property's wire decode are skipped and counted.
    pub fn from_params(schema: &EntitySchema, params: &HashMap<String, String>) -> Self {
        let mut set = FilterSet::default();
        for (name, raw) in params {
            if RESERVED_PARAMS.contains(&name.as_str()) || raw.is_empty() {
                continue;
            }
            let Some(spec) = schema.property(name) else {
                tracing::debug!(kind = schema.kind(), param = %name, "ignoring unknown filter parameter");
                set.ignored += 1;
                continue;
            };
            // repeated properties filter per element: decode the parameter
            // as a scalar and let the store match it against any element
            let wire = Value::String(raw.clone());
            match spec.kind.decode_from_wire(name, false, &wire) {
                Ok(Some(value)) => set.filters.push(Filter {
                    property: name.clone(),
                    value,
                }),
                Ok(None) | Err(_) => {
                    tracing::debug!(kind = schema.kind(), param = %name, "ignoring unconvertible filter parameter");
                    set.ignored += 1;
                }
            }
        }
        set
    }
}
