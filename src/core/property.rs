//! Property kinds and values
//!
//! Every entity field is described by a [`PropertyKind`] (the semantic type)
//! and holds a [`PropertyValue`] (the storage-native value). The kind drives
//! conversion between wire JSON and native values; the dispatch is a closed
//! `match` over the kind set, so new kinds are added by extending the enum,
//! not by subclassing.
//!
//! Wire conventions:
//! - DateTime: `"YYYY-MM-DDTHH:MM:SSZ"`, Date: `"YYYY-MM-DD"`,
//!   Time: `"HH:MM:SS"`
//! - Keys travel as opaque urlsafe strings
//! - Blobs travel as standard base64
//! - References travel as `{"urlsafe_key", "display"}`

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{json, Value};
use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;

use crate::core::entity::Entity;
use crate::core::error::{StrataResult, ValidationError};
use crate::core::key::Key;
use crate::core::reference::{ReferenceConfig, ReferenceValue};
use crate::core::schema::EntitySchema;

/// Wire format for DateTime properties
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
/// Wire format for Date properties
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Wire format for Time properties
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// A geographic point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPt {
    pub lat: f64,
    pub lng: f64,
}

/// The semantic type of one property
#[derive(Debug, Clone)]
pub enum PropertyKind {
    /// Short string, filterable
    String,
    /// Long-form text
    Text,
    Integer,
    Float,
    Boolean,
    /// Raw bytes, base64 on the wire
    Blob,
    /// Arbitrary JSON payload, stored as-is
    Json,
    Date,
    Time,
    DateTime,
    /// An opaque key pointing at another entity
    Key,
    GeoPt,
    /// Derived server-side; never accepts inbound wire values
    Computed,
    /// Embedded sub-entity with its own schema
    Structured(Arc<EntitySchema>),
    /// Cached display projection of another entity plus its key
    Reference(ReferenceConfig),
}

/// A storage-native property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Blob(Vec<u8>),
    Json(Value),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
    Key(Key),
    GeoPt(GeoPt),
    Embedded(Entity),
    Reference(ReferenceValue),
    /// Ordered sequence for repeated properties
    List(Vec<PropertyValue>),
}

impl PropertyKind {
    /// Decode a JSON wire value into the storage-native value.
    ///
    /// Returns `Ok(None)` only for computed properties, which never accept
    /// client-supplied values. Repetition shape is enforced here: a repeated
    /// property requires an array, a scalar property rejects one.
    pub fn decode_from_wire(
        &self,
        name: &str,
        repeated: bool,
        raw: &Value,
    ) -> StrataResult<Option<PropertyValue>> {
        if matches!(self, PropertyKind::Computed) {
            return Ok(None);
        }

        if repeated {
            let items = raw
                .as_array()
                .ok_or_else(|| ValidationError::shape(name, "array", raw))?;
            let mut decoded = Vec::with_capacity(items.len());
            for item in items {
                decoded.push(self.decode_scalar(name, item)?);
            }
            return Ok(Some(PropertyValue::List(decoded)));
        }

        // GeoPt ([lat, lng]) and Json carry arrays in their scalar wire form
        if raw.is_array() && !matches!(self, PropertyKind::GeoPt | PropertyKind::Json) {
            return Err(ValidationError::shape(name, "scalar", raw));
        }
        Ok(Some(self.decode_scalar(name, raw)?))
    }

    fn decode_scalar(&self, name: &str, raw: &Value) -> StrataResult<PropertyValue> {
        match self {
            PropertyKind::String | PropertyKind::Text => match raw.as_str() {
                Some(s) => Ok(PropertyValue::Str(s.to_string())),
                None => Err(ValidationError::shape(name, "string", raw)),
            },
            PropertyKind::Integer => decode_integer(name, raw),
            PropertyKind::Float => decode_float(name, raw),
            PropertyKind::Boolean => decode_boolean(name, raw),
            PropertyKind::Blob => match raw.as_str() {
                Some(s) => BASE64
                    .decode(s)
                    .map(PropertyValue::Blob)
                    .map_err(|e| ValidationError::field(name, format!("invalid base64: {}", e))),
                None => Err(ValidationError::shape(name, "string", raw)),
            },
            PropertyKind::Json => Ok(PropertyValue::Json(raw.clone())),
            PropertyKind::Date => parse_temporal(name, raw, DATE_FORMAT, |s| {
                NaiveDate::parse_from_str(s, DATE_FORMAT).map(PropertyValue::Date)
            }),
            PropertyKind::Time => parse_temporal(name, raw, TIME_FORMAT, |s| {
                NaiveTime::parse_from_str(s, TIME_FORMAT).map(PropertyValue::Time)
            }),
            PropertyKind::DateTime => parse_temporal(name, raw, DATETIME_FORMAT, |s| {
                NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                    .map(|dt| PropertyValue::DateTime(dt.and_utc()))
            }),
            PropertyKind::Key => decode_key(name, raw),
            PropertyKind::GeoPt => decode_geopt(name, raw),
            PropertyKind::Computed => unreachable!("computed handled in decode_from_wire"),
            PropertyKind::Structured(schema) => {
                if !raw.is_object() {
                    return Err(ValidationError::shape(name, "object", raw));
                }
                Ok(PropertyValue::Embedded(Entity::from_dict(
                    schema.clone(),
                    raw,
                )?))
            }
            PropertyKind::Reference(config) => Ok(PropertyValue::Reference(
                ReferenceValue::decode_from_wire(config, name, raw)?,
            )),
        }
    }

    /// Validate a native value against this kind and repetition, independent
    /// of the wire format. Applies to values set via the direct API too.
    pub fn validate(&self, name: &str, repeated: bool, value: &PropertyValue) -> StrataResult<()> {
        if repeated {
            let items = match value {
                PropertyValue::List(items) => items,
                other => {
                    return Err(ValidationError::field(
                        name,
                        format!("expected a list value, got {}", variant_name(other)),
                    ))
                }
            };
            for item in items {
                self.validate_scalar(name, item)?;
            }
            return Ok(());
        }
        if matches!(value, PropertyValue::List(_)) {
            return Err(ValidationError::field(name, "expected a scalar value, got a list"));
        }
        self.validate_scalar(name, value)
    }

    fn validate_scalar(&self, name: &str, value: &PropertyValue) -> StrataResult<()> {
        let ok = matches!(
            (self, value),
            (PropertyKind::String, PropertyValue::Str(_))
                | (PropertyKind::Text, PropertyValue::Str(_))
                | (PropertyKind::Integer, PropertyValue::Int(_))
                | (PropertyKind::Float, PropertyValue::Float(_))
                | (PropertyKind::Boolean, PropertyValue::Bool(_))
                | (PropertyKind::Blob, PropertyValue::Blob(_))
                | (PropertyKind::Json, PropertyValue::Json(_))
                | (PropertyKind::Date, PropertyValue::Date(_))
                | (PropertyKind::Time, PropertyValue::Time(_))
                | (PropertyKind::DateTime, PropertyValue::DateTime(_))
                | (PropertyKind::Key, PropertyValue::Key(_))
                | (PropertyKind::GeoPt, PropertyValue::GeoPt(_))
                | (PropertyKind::Structured(_), PropertyValue::Embedded(_))
                | (PropertyKind::Reference(_), PropertyValue::Reference(_))
        ) || matches!(self, PropertyKind::Computed);
        if ok {
            Ok(())
        } else {
            Err(ValidationError::field(
                name,
                format!(
                    "value {} does not match property kind {:?}",
                    variant_name(value),
                    kind_name(self)
                ),
            ))
        }
    }
}

impl PropertyValue {
    /// Encode this value back to its JSON wire form.
    ///
    /// The inverse of `decode_from_wire`; references always emit the compact
    /// `{"urlsafe_key", "display"}` projection, never the full target.
    pub fn to_wire(&self) -> Value {
        match self {
            PropertyValue::Str(s) => json!(s),
            PropertyValue::Int(i) => json!(i),
            PropertyValue::Float(f) => json!(f),
            PropertyValue::Bool(b) => json!(b),
            PropertyValue::Blob(bytes) => json!(BASE64.encode(bytes)),
            PropertyValue::Json(v) => v.clone(),
            PropertyValue::Date(d) => json!(d.format(DATE_FORMAT).to_string()),
            PropertyValue::Time(t) => json!(t.format(TIME_FORMAT).to_string()),
            PropertyValue::DateTime(dt) => json!(dt.format(DATETIME_FORMAT).to_string()),
            PropertyValue::Key(k) => json!(k.urlsafe()),
            PropertyValue::GeoPt(pt) => json!({ "lat": pt.lat, "lng": pt.lng }),
            PropertyValue::Embedded(entity) => Value::Object(entity.to_dict()),
            PropertyValue::Reference(reference) => reference.encode_to_wire(),
            PropertyValue::List(items) => {
                Value::Array(items.iter().map(PropertyValue::to_wire).collect())
            }
        }
    }

    /// Ordering between two values of the same variant, for query sorting.
    ///
    /// Values of different variants (and unorderable kinds) compare as None.
    pub fn compare(&self, other: &PropertyValue) -> Option<CmpOrdering> {
        match (self, other) {
            (PropertyValue::Str(a), PropertyValue::Str(b)) => Some(a.cmp(b)),
            (PropertyValue::Int(a), PropertyValue::Int(b)) => Some(a.cmp(b)),
            (PropertyValue::Float(a), PropertyValue::Float(b)) => a.partial_cmp(b),
            (PropertyValue::Bool(a), PropertyValue::Bool(b)) => Some(a.cmp(b)),
            (PropertyValue::Date(a), PropertyValue::Date(b)) => Some(a.cmp(b)),
            (PropertyValue::Time(a), PropertyValue::Time(b)) => Some(a.cmp(b)),
            (PropertyValue::DateTime(a), PropertyValue::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// The value as a string slice, when it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

fn decode_integer(name: &str, raw: &Value) -> StrataResult<PropertyValue> {
    if let Some(i) = raw.as_i64() {
        return Ok(PropertyValue::Int(i));
    }
    if let Some(f) = raw.as_f64() {
        return Ok(PropertyValue::Int(f as i64));
    }
    if let Some(s) = raw.as_str() {
        return s
            .parse::<i64>()
            .map(PropertyValue::Int)
            .map_err(|_| ValidationError::field(name, format!("'{}' is not an integer", s)));
    }
    Err(ValidationError::shape(name, "number", raw))
}

fn decode_float(name: &str, raw: &Value) -> StrataResult<PropertyValue> {
    if let Some(f) = raw.as_f64() {
        return Ok(PropertyValue::Float(f));
    }
    if let Some(s) = raw.as_str() {
        return s
            .parse::<f64>()
            .map(PropertyValue::Float)
            .map_err(|_| ValidationError::field(name, format!("'{}' is not a number", s)));
    }
    Err(ValidationError::shape(name, "number", raw))
}

// The strings "false"/"False" coerce to false; other strings follow the
// usual truthiness of non-empty text.
fn decode_boolean(name: &str, raw: &Value) -> StrataResult<PropertyValue> {
    match raw {
        Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
        Value::String(s) => Ok(PropertyValue::Bool(
            !s.is_empty() && s != "false" && s != "False",
        )),
        Value::Number(n) => Ok(PropertyValue::Bool(n.as_f64() != Some(0.0))),
        _ => Err(ValidationError::shape(name, "bool", raw)),
    }
}

fn decode_key(name: &str, raw: &Value) -> StrataResult<PropertyValue> {
    let urlsafe = match raw {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("urlsafe_key")
            .or_else(|| map.get(crate::core::entity::RESERVED_KEY))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ValidationError::field(name, "object form requires 'urlsafe_key' or '$$key$$'")
            })?,
        _ => return Err(ValidationError::shape(name, "string", raw)),
    };
    Key::from_urlsafe(&urlsafe)
        .map(PropertyValue::Key)
        .map_err(|_| ValidationError::field(name, format!("'{}' is not a valid key", urlsafe)))
}

fn decode_geopt(name: &str, raw: &Value) -> StrataResult<PropertyValue> {
    let number = |v: &Value, what: &str| {
        v.as_f64()
            .ok_or_else(|| ValidationError::field(name, format!("{} must be a number", what)))
    };
    match raw {
        Value::Array(items) if items.len() == 2 => Ok(PropertyValue::GeoPt(GeoPt {
            lat: number(&items[0], "lat")?,
            lng: number(&items[1], "lng")?,
        })),
        Value::Object(map) => {
            let lat = map
                .get("lat")
                .ok_or_else(|| ValidationError::field(name, "missing 'lat'"))?;
            let lng = map
                .get("lng")
                .or_else(|| map.get("lon"))
                .ok_or_else(|| ValidationError::field(name, "missing 'lng'"))?;
            Ok(PropertyValue::GeoPt(GeoPt {
                lat: number(lat, "lat")?,
                lng: number(lng, "lng")?,
            }))
        }
        _ => Err(ValidationError::shape(name, "[lat, lng] or {lat, lng}", raw)),
    }
}

fn parse_temporal<F>(name: &str, raw: &Value, format: &str, parse: F) -> StrataResult<PropertyValue>
where
    F: Fn(&str) -> Result<PropertyValue, chrono::ParseError>,
{
    let s = raw
        .as_str()
        .ok_or_else(|| ValidationError::shape(name, "string", raw))?;
    parse(s).map_err(|_| {
        ValidationError::field(name, format!("'{}' does not match format '{}'", s, format))
    })
}

fn variant_name(value: &PropertyValue) -> &'static str {
    match value {
        PropertyValue::Str(_) => "string",
        PropertyValue::Int(_) => "integer",
        PropertyValue::Float(_) => "float",
        PropertyValue::Bool(_) => "bool",
        PropertyValue::Blob(_) => "blob",
        PropertyValue::Json(_) => "json",
        PropertyValue::Date(_) => "date",
        PropertyValue::Time(_) => "time",
        PropertyValue::DateTime(_) => "datetime",
        PropertyValue::Key(_) => "key",
        PropertyValue::GeoPt(_) => "geopt",
        PropertyValue::Embedded(_) => "embedded entity",
        PropertyValue::Reference(_) => "reference",
        PropertyValue::List(_) => "list",
    }
}

fn kind_name(kind: &PropertyKind) -> &'static str {
    match kind {
        PropertyKind::String => "String",
        PropertyKind::Text => "Text",
        PropertyKind::Integer => "Integer",
        PropertyKind::Float => "Float",
        PropertyKind::Boolean => "Boolean",
        PropertyKind::Blob => "Blob",
        PropertyKind::Json => "Json",
        PropertyKind::Date => "Date",
        PropertyKind::Time => "Time",
        PropertyKind::DateTime => "DateTime",
        PropertyKind::Key => "Key",
        PropertyKind::GeoPt => "GeoPt",
        PropertyKind::Computed => "Computed",
        PropertyKind::Structured(_) => "Structured",
        PropertyKind::Reference(_) => "Reference",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::StrataError;

    #[test]
    fn test_string_decode_rejects_number() {
        let err = PropertyKind::String
            .decode_from_wire("name", false, &json!(42))
            .unwrap_err();
        assert!(matches!(err, StrataError::Validation(_)));
    }

    #[test]
    fn test_integer_accepts_numeric_string() {
        let value = PropertyKind::Integer
            .decode_from_wire("age", false, &json!("42"))
            .unwrap()
            .unwrap();
        assert_eq!(value, PropertyValue::Int(42));
    }

    #[test]
    fn test_boolean_string_coercion() {
        for (raw, expected) in [
            (json!("false"), false),
            (json!("False"), false),
            (json!("yes"), true),
            (json!(""), false),
            (json!(true), true),
        ] {
            let value = PropertyKind::Boolean
                .decode_from_wire("ok", false, &raw)
                .unwrap()
                .unwrap();
            assert_eq!(value, PropertyValue::Bool(expected), "raw = {:?}", raw);
        }
    }

    #[test]
    fn test_datetime_wire_format() {
        let value = PropertyKind::DateTime
            .decode_from_wire("at", false, &json!("2024-03-01T12:30:00Z"))
            .unwrap()
            .unwrap();
        assert_eq!(value.to_wire(), json!("2024-03-01T12:30:00Z"));
    }

    #[test]
    fn test_date_and_time_wire_formats() {
        let date = PropertyKind::Date
            .decode_from_wire("on", false, &json!("2024-03-01"))
            .unwrap()
            .unwrap();
        assert_eq!(date.to_wire(), json!("2024-03-01"));

        let time = PropertyKind::Time
            .decode_from_wire("at", false, &json!("09:15:00"))
            .unwrap()
            .unwrap();
        assert_eq!(time.to_wire(), json!("09:15:00"));
    }

    #[test]
    fn test_unparsable_date_fails() {
        let err = PropertyKind::Date
            .decode_from_wire("on", false, &json!("01/03/2024"))
            .unwrap_err();
        assert!(matches!(err, StrataError::Validation(_)));
    }

    #[test]
    fn test_repeated_requires_array() {
        let err = PropertyKind::String
            .decode_from_wire("tags", true, &json!("solo"))
            .unwrap_err();
        assert!(matches!(err, StrataError::Validation(_)));
    }

    #[test]
    fn test_scalar_rejects_array() {
        let err = PropertyKind::String
            .decode_from_wire("name", false, &json!(["a", "b"]))
            .unwrap_err();
        assert!(matches!(err, StrataError::Validation(_)));
    }

    #[test]
    fn test_repeated_preserves_order() {
        let value = PropertyKind::Integer
            .decode_from_wire("scores", true, &json!([3, 1, 2]))
            .unwrap()
            .unwrap();
        assert_eq!(
            value,
            PropertyValue::List(vec![
                PropertyValue::Int(3),
                PropertyValue::Int(1),
                PropertyValue::Int(2),
            ])
        );
        assert_eq!(value.to_wire(), json!([3, 1, 2]));
    }

    #[test]
    fn test_computed_ignores_inbound_values() {
        let decoded = PropertyKind::Computed
            .decode_from_wire("total", false, &json!(999))
            .unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn test_key_accepts_dollar_key_spelling() {
        let key = Key::new("customer", "c1");
        let raw = json!({ "$$key$$": key.urlsafe() });
        let value = PropertyKind::Key
            .decode_from_wire("owner", false, &raw)
            .unwrap()
            .unwrap();
        assert_eq!(value, PropertyValue::Key(key));
    }

    #[test]
    fn test_geopt_both_shapes() {
        let from_array = PropertyKind::GeoPt
            .decode_from_wire("loc", false, &json!([4.6, -74.08]))
            .unwrap()
            .unwrap();
        let from_object = PropertyKind::GeoPt
            .decode_from_wire("loc", false, &json!({"lat": 4.6, "lon": -74.08}))
            .unwrap()
            .unwrap();
        assert_eq!(from_array, from_object);
        assert_eq!(from_array.to_wire(), json!({"lat": 4.6, "lng": -74.08}));
    }

    #[test]
    fn test_scalar_json_accepts_array_payload() {
        let value = PropertyKind::Json
            .decode_from_wire("extras", false, &json!([1, "two", null]))
            .unwrap()
            .unwrap();
        assert_eq!(value, PropertyValue::Json(json!([1, "two", null])));
    }

    #[test]
    fn test_blob_base64_roundtrip() {
        let encoded = BASE64.encode(b"\x00\x01binary");
        let value = PropertyKind::Blob
            .decode_from_wire("payload", false, &json!(encoded))
            .unwrap()
            .unwrap();
        assert_eq!(value, PropertyValue::Blob(b"\x00\x01binary".to_vec()));
        assert_eq!(value.to_wire(), json!(encoded));
    }

    #[test]
    fn test_roundtrip_idempotence_after_normalization() {
        // decode(encode(decode(v))) == decode(v) for coercing kinds
        let cases = [
            (PropertyKind::Integer, json!("17")),
            (PropertyKind::Boolean, json!("False")),
            (PropertyKind::Float, json!("2.5")),
            (PropertyKind::DateTime, json!("2024-01-02T03:04:05Z")),
        ];
        for (kind, raw) in cases {
            let first = kind.decode_from_wire("p", false, &raw).unwrap().unwrap();
            let second = kind
                .decode_from_wire("p", false, &first.to_wire())
                .unwrap()
                .unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_validate_rejects_mismatched_variant() {
        let err = PropertyKind::Integer
            .validate("age", false, &PropertyValue::Str("x".to_string()))
            .unwrap_err();
        assert!(matches!(err, StrataError::Validation(_)));
    }

    #[test]
    fn test_validate_repeated_shape() {
        let list = PropertyValue::List(vec![PropertyValue::Int(1)]);
        assert!(PropertyKind::Integer.validate("xs", true, &list).is_ok());
        assert!(PropertyKind::Integer
            .validate("xs", false, &list)
            .is_err());
        assert!(PropertyKind::Integer
            .validate("xs", true, &PropertyValue::Int(1))
            .is_err());
    }

    #[test]
    fn test_compare_orders_same_variant_only() {
        assert_eq!(
            PropertyValue::Int(1).compare(&PropertyValue::Int(2)),
            Some(CmpOrdering::Less)
        );
        assert_eq!(
            PropertyValue::Int(1).compare(&PropertyValue::Str("a".to_string())),
            None
        );
    }
}
