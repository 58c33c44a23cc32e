//! Opaque entity keys
//!
//! A [`Key`] names one durably persisted entity: its kind, its identifier
//! and, for child entities, the key of its parent. Keys travel on the wire
//! as an opaque URL-safe string so clients never depend on the internal
//! structure.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{StorageError, StrataError, StrataResult};

/// Durable identifier for a persisted entity.
///
/// An entity without a `Key` has never been saved; the store mints one on
/// the first successful put.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    /// Entity kind, e.g. "customer"
    pub kind: String,

    /// Raw identifier within the kind
    pub id: String,

    /// Parent key for child entities (key-space hierarchy)
    pub parent: Option<Box<Key>>,
}

impl Key {
    /// Create a root key with an explicit identifier
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            parent: None,
        }
    }

    /// Create a root key with a freshly minted identifier
    pub fn minted(kind: impl Into<String>) -> Self {
        Self::new(kind, Uuid::new_v4().simple().to_string())
    }

    /// Create a child key parented under `parent`
    pub fn child_of(parent: &Key, kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            parent: Some(Box::new(parent.clone())),
        }
    }

    /// Create a child key with a freshly minted identifier
    pub fn minted_child_of(parent: &Key, kind: impl Into<String>) -> Self {
        Self::child_of(parent, kind, Uuid::new_v4().simple().to_string())
    }

    /// The opaque wire form of this key.
    ///
    /// Encodes the root-first `kind:id` path with URL-safe base64 so the
    /// result is usable in URLs and JSON without escaping.
    pub fn urlsafe(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.path())
    }

    /// Decode a key from its opaque wire form.
    ///
    /// Returns [`StorageError::BadKey`]; lookup paths translate that to
    /// `NotFound` instead of leaking it to clients.
    pub fn from_urlsafe(value: &str) -> StrataResult<Self> {
        let bad_key = || {
            StrataError::Storage(StorageError::BadKey {
                value: value.to_string(),
            })
        };

        let bytes = URL_SAFE_NO_PAD.decode(value).map_err(|_| bad_key())?;
        let path = String::from_utf8(bytes).map_err(|_| bad_key())?;

        let mut key: Option<Key> = None;
        for segment in path.split('/') {
            let (kind, id) = segment.split_once(':').ok_or_else(bad_key)?;
            if kind.is_empty() || id.is_empty() {
                return Err(bad_key());
            }
            key = Some(Key {
                kind: kind.to_string(),
                id: id.to_string(),
                parent: key.map(Box::new),
            });
        }
        key.ok_or_else(bad_key)
    }

    fn path(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}/{}:{}", parent.path(), self.kind, self.id),
            None => format!("{}:{}", self.kind, self.id),
        }
    }
}
