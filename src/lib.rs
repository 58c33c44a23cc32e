//! # Strata
//!
//! A schema-driven toolkit for CRUD services over a hosted document store.
//!
//! ## Features
//!
//! - **Typed Properties**: JSON wire conversion per property kind (dates,
//!   blobs, geo points, embedded entities) with shape validation
//! - **Reference Properties**: references carry an opaque key plus a display
//!   snapshot; nested unsaved targets are persisted for you after the owner
//! - **Deferred Resolution**: keyless references are scanned before a save,
//!   created concurrently after it, and patched in with a single re-save
//! - **Dict Marshaling**: canonical JSON form with reserved `$$id$$` and
//!   `$$key$$` fields on persisted entities; inbound nulls mean "leave as is"
//! - **Generic CRUD Mediator**: bind a schema, a store, an ordering, and
//!   hooks; get the four operations with permissive query filters
//! - **Pluggable Storage**: one async `DocumentStore` trait, with an
//!   in-memory backend for tests and development
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! let account = EntitySchema::builder("account")
//!     .property("display", PropertyKind::String)
//!     .build()?;
//!
//! let invoice = EntitySchema::builder("invoice")
//!     .property("amount", PropertyKind::Float)
//!     .reference("account", ReferenceConfig::new(account))
//!     .build()?;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let mediator = CrudMediator::new(invoice, store)
//!     .with_ordering(vec![Ordering::desc("amount")]);
//!
//! // a nested, keyless account is created and linked during the save
//! let (status, body) = mediator
//!     .post(&serde_json::json!({
//!         "amount": 99.5,
//!         "account": { "display": "Acme" },
//!     }))
//!     .await?;
//! ```

pub mod config;
pub mod core;
pub mod mediator;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        backfill_displays, pending_references, save, ConfigError, DisplayRule, DocumentStore,
        Entity, EntitySchema, ErrorResponse, Filter, FilterSet, GeoPt, Key, Ordering,
        PendingReference, PropertyKind, PropertySpec, PropertyValue, ReferenceConfig,
        ReferenceValue, RequestError, SchemaBuilder, StorageError, StrataError, StrataResult,
        ValidationError, RESERVED_ID, RESERVED_KEY,
    };

    // === Mediator ===
    pub use crate::mediator::{CrudHooks, CrudMediator, NoHooks};

    // === Storage ===
    pub use crate::storage::InMemoryStore;

    // === Config ===
    pub use crate::config::{CrudConfig, ModelConfig};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use axum::http::StatusCode;
    pub use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
    pub use serde_json::{json, Value};
    pub use std::sync::Arc;
}
