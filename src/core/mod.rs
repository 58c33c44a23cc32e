//! Core module containing the schema, entity, and persistence primitives

pub mod entity;
pub mod error;
pub mod key;
pub mod property;
pub mod query;
pub mod reference;
pub mod save;
pub mod schema;
pub mod store;

pub use entity::{Entity, RESERVED_ID, RESERVED_KEY};
pub use error::{
    ConfigError, ErrorResponse, RequestError, StorageError, StrataError, StrataResult,
    ValidationError,
};
pub use key::Key;
pub use property::{GeoPt, PropertyKind, PropertyValue};
pub use query::{Filter, FilterSet, Ordering};
pub use reference::{DisplayRule, ReferenceConfig, ReferenceValue};
pub use save::{backfill_displays, pending_references, resolve_references, save, PendingReference};
pub use schema::{EntitySchema, PropertySpec, SchemaBuilder};
pub use store::DocumentStore;
