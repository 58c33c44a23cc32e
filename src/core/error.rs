//! Typed error handling for the strata framework
//!
//! This module provides the error type hierarchy that lets callers handle
//! failures specifically rather than dealing with generic `anyhow::Error`
//! values.
//!
//! # Error Categories
//!
//! - [`ValidationError`]: malformed or type-mismatched wire input (4xx)
//! - [`ConfigError`]: invalid schema/reference setup, fatal at model
//!   definition time
//! - `NotFound`: a key/id lookup found nothing (404)
//! - `UnresolvedReference`: a non-creatable reference was left dangling
//!   after save
//! - `DuplicateIdentifier`: creating an entity whose identifier exists (409)
//! - [`StorageError`]: store backend failures
//! - [`RequestError`]: malformed CRUD requests
//!
//! # Example
//!
//! ```rust,ignore
//! match mediator.get(&params).await {
//!     Ok((status, body)) => respond(status, body),
//!     Err(StrataError::NotFound { kind, lookup }) => {
//!         println!("{} '{}' not found", kind, lookup);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt;

/// The main error type for the strata framework
#[derive(Debug)]
pub enum StrataError {
    /// Wire input validation errors
    Validation(ValidationError),

    /// Schema/reference configuration errors
    Config(ConfigError),

    /// A key or identifier lookup found nothing
    NotFound {
        kind: String,
        lookup: String,
    },

    /// A reference without `allow_new` was still keyless after save.
    ///
    /// The owning entity's write is not rolled back; the persisted copy may
    /// carry an empty reference key until the caller repairs it.
    UnresolvedReference {
        kind: String,
        property: String,
    },

    /// Creating an entity whose identifier already exists
    DuplicateIdentifier {
        kind: String,
        id: String,
    },

    /// Storage backend errors
    Storage(StorageError),

    /// Malformed CRUD requests
    Request(RequestError),

    /// Internal framework errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for StrataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrataError::Validation(e) => write!(f, "{}", e),
            StrataError::Config(e) => write!(f, "{}", e),
            StrataError::NotFound { kind, lookup } => {
                write!(f, "{} '{}' not found", kind, lookup)
            }
            StrataError::UnresolvedReference { kind, property } => {
                write!(
                    f,
                    "reference property '{}' on {} is unresolved after save",
                    property, kind
                )
            }
            StrataError::DuplicateIdentifier { kind, id } => {
                write!(f, "{} with id '{}' already exists", kind, id)
            }
            StrataError::Storage(e) => write!(f, "{}", e),
            StrataError::Request(e) => write!(f, "{}", e),
            StrataError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for StrataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StrataError::Validation(e) => Some(e),
            StrataError::Config(e) => Some(e),
            StrataError::Storage(e) => Some(e),
            StrataError::Request(e) => Some(e),
            _ => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StrataError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            StrataError::Validation(_) => StatusCode::BAD_REQUEST,
            StrataError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StrataError::NotFound { .. } => StatusCode::NOT_FOUND,
            StrataError::UnresolvedReference { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            StrataError::DuplicateIdentifier { .. } => StatusCode::CONFLICT,
            StrataError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StrataError::Request(e) => e.status_code(),
            StrataError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            StrataError::Validation(_) => "VALIDATION_ERROR",
            StrataError::Config(_) => "CONFIG_ERROR",
            StrataError::NotFound { .. } => "ENTITY_NOT_FOUND",
            StrataError::UnresolvedReference { .. } => "UNRESOLVED_REFERENCE",
            StrataError::DuplicateIdentifier { .. } => "DUPLICATE_IDENTIFIER",
            StrataError::Storage(_) => "STORAGE_ERROR",
            StrataError::Request(e) => e.error_code(),
            StrataError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    /// Get additional details for the error
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            StrataError::NotFound { kind, lookup } => Some(serde_json::json!({
                "kind": kind,
                "lookup": lookup,
            })),
            StrataError::UnresolvedReference { kind, property } => Some(serde_json::json!({
                "kind": kind,
                "property": property,
            })),
            StrataError::DuplicateIdentifier { kind, id } => Some(serde_json::json!({
                "kind": kind,
                "id": id,
            })),
            StrataError::Validation(ValidationError::FieldError { field, .. }) => {
                Some(serde_json::json!({ "field": field }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for StrataError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to wire input validation
#[derive(Debug)]
pub enum ValidationError {
    /// A property value failed decoding or validation
    FieldError {
        field: String,
        message: String,
    },

    /// A scalar was given where a sequence was required, or vice versa
    ShapeMismatch {
        field: String,
        expected: &'static str,
        got: String,
    },

    /// Invalid JSON shape for an entity body
    InvalidJson {
        message: String,
    },
}

impl ValidationError {
    /// Shorthand for a per-field decode failure
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> StrataError {
        StrataError::Validation(ValidationError::FieldError {
            field: field.into(),
            message: message.into(),
        })
    }

    /// Shorthand for a scalar/sequence shape failure
    pub fn shape(
        field: impl Into<String>,
        expected: &'static str,
        got: &serde_json::Value,
    ) -> StrataError {
        StrataError::Validation(ValidationError::ShapeMismatch {
            field: field.into(),
            expected,
            got: value_type_name(got).to_string(),
        })
    }
}

/// Name of a JSON value's type, for error messages
pub(crate) fn value_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::FieldError { field, message } => {
                write!(f, "Validation error for field '{}': {}", field, message)
            }
            ValidationError::ShapeMismatch {
                field,
                expected,
                got,
            } => {
                write!(f, "Field '{}' expected {}, got {}", field, expected, got)
            }
            ValidationError::InvalidJson { message } => {
                write!(f, "Invalid JSON: {}", message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for StrataError {
    fn from(err: ValidationError) -> Self {
        StrataError::Validation(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors raised while defining schemas or loading configuration.
///
/// These are fatal at startup and never recoverable at request time.
#[derive(Debug)]
pub enum ConfigError {
    /// A reference display rule names a property that is missing or not
    /// string-typed on the target schema
    InvalidDisplayRule {
        kind: String,
        property: String,
        message: String,
    },

    /// A property name was registered twice on the same schema
    DuplicateProperty {
        kind: String,
        property: String,
    },

    /// Failed to parse a configuration file
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// A configured model names an unknown property
    UnknownProperty {
        kind: String,
        property: String,
    },

    /// IO error while reading configuration
    IoError {
        message: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDisplayRule {
                kind,
                property,
                message,
            } => {
                write!(
                    f,
                    "Invalid display rule for reference '{}' on {}: {}",
                    property, kind, message
                )
            }
            ConfigError::DuplicateProperty { kind, property } => {
                write!(f, "Property '{}' defined twice on {}", property, kind)
            }
            ConfigError::ParseError { file, message } => {
                if let Some(file) = file {
                    write!(f, "Failed to parse config file '{}': {}", file, message)
                } else {
                    write!(f, "Failed to parse config: {}", message)
                }
            }
            ConfigError::UnknownProperty { kind, property } => {
                write!(
                    f,
                    "Configured property '{}' does not exist on {}",
                    property, kind
                )
            }
            ConfigError::IoError { message } => {
                write!(f, "IO error: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for StrataError {
    fn from(err: ConfigError) -> Self {
        StrataError::Config(err)
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to storage backends
#[derive(Debug)]
pub enum StorageError {
    /// Lock or connection acquisition failed
    Unavailable {
        backend: String,
        message: String,
    },

    /// A write failed
    WriteFailed {
        kind: String,
        message: String,
    },

    /// An opaque key string could not be decoded.
    ///
    /// Lookup paths translate this to `NotFound` rather than leaking it.
    BadKey {
        value: String,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable { backend, message } => {
                write!(f, "Storage backend '{}' unavailable: {}", backend, message)
            }
            StorageError::WriteFailed { kind, message } => {
                write!(f, "Failed to write {}: {}", kind, message)
            }
            StorageError::BadKey { value } => {
                write!(f, "Malformed key string: '{}'", value)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for StrataError {
    fn from(err: StorageError) -> Self {
        StrataError::Storage(err)
    }
}

// =============================================================================
// Request Errors
// =============================================================================

/// Errors related to CRUD requests
#[derive(Debug)]
pub enum RequestError {
    /// Neither a key nor an id was supplied where one is required
    MissingKeyOrId,

    /// Invalid request body
    InvalidBody {
        message: String,
    },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::MissingKeyOrId => {
                write!(f, "A 'key' or 'id' parameter is required")
            }
            RequestError::InvalidBody { message } => {
                write!(f, "Invalid request body: {}", message)
            }
        }
    }
}

impl std::error::Error for RequestError {}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::MissingKeyOrId => StatusCode::BAD_REQUEST,
            RequestError::InvalidBody { .. } => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RequestError::MissingKeyOrId => "MISSING_KEY_OR_ID",
            RequestError::InvalidBody { .. } => "INVALID_BODY",
        }
    }
}

impl From<RequestError> for StrataError {
    fn from(err: RequestError) -> Self {
        StrataError::Request(err)
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        StrataError::Validation(ValidationError::InvalidJson {
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self {
        StrataError::Config(ConfigError::IoError {
            message: err.to_string(),
        })
    }
}

impl From<serde_yaml::Error> for StrataError {
    fn from(err: serde_yaml::Error) -> Self {
        StrataError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

/// Convert from anyhow::Error for interop with callers that use it
impl From<anyhow::Error> for StrataError {
    fn from(err: anyhow::Error) -> Self {
        StrataError::Internal(err.to_string())
    }
}

// =============================================================================
// Result type alias
// =============================================================================

/// A specialized Result type for strata operations
pub type StrataResult<T> = Result<T, StrataError>;

// =============================================================================
// Tests
// =============================================================================
