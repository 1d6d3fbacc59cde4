//! Scalar property domains and their canonical text encoding.
//!
//! # Responsibility
//! - Define the fixed set of property types an aspect can carry.
//! - Convert values to and from the canonical text form used by EAV rows,
//!   default values and structural hashing.
//! - Apply the lossless widening rules used when a value is written.
//!
//! # Invariants
//! - `parse_canonical(ty, &v.to_canonical_text())` yields a value equal to `v`
//!   for every `v` whose `property_type()` is `ty`.
//! - A multivalued property is always `PropertyValue::Multi`, a single-valued
//!   one is always `PropertyValue::Single` or `PropertyValue::Null`.

use crate::model::error::ValidationError;
use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

static URI_SCHEME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:\S*$").expect("valid uri regex"));

/// Scalar domain of one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Integer,
    Float,
    Boolean,
    String,
    BigInteger,
    BigDecimal,
    Timestamp,
    Uri,
    Uuid,
    /// Large character object.
    Clob,
    /// Large binary object. The only type stored outside the text column.
    Blob,
}

impl PropertyType {
    pub const ALL: [PropertyType; 11] = [
        Self::Integer,
        Self::Float,
        Self::Boolean,
        Self::String,
        Self::BigInteger,
        Self::BigDecimal,
        Self::Timestamp,
        Self::Uri,
        Self::Uuid,
        Self::Clob,
        Self::Blob,
    ];

    /// Stable storage name, persisted in `property_def.property_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::BigInteger => "big_integer",
            Self::BigDecimal => "big_decimal",
            Self::Timestamp => "timestamp",
            Self::Uri => "uri",
            Self::Uuid => "uuid",
            Self::Clob => "clob",
            Self::Blob => "blob",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.as_str() == value)
    }

    pub fn is_binary(self) -> bool {
        self == Self::Blob
    }

    /// Converts `value` into this type, or fails with `TypeMismatch`.
    ///
    /// Only lossless widening is applied; nothing is parsed from strings
    /// except URI validation.
    pub fn coerce(self, property: &str, value: Value) -> Result<Value, ValidationError> {
        let actual = value.property_type();
        let coerced = match (self, value) {
            (Self::Uri, Value::Uri(text)) | (Self::Uri, Value::String(text)) => {
                if !URI_SCHEME_RE.is_match(&text) {
                    return Err(ValidationError::InvalidValue {
                        property_type: self,
                        text,
                        message: "uri must start with a scheme".to_string(),
                    });
                }
                Value::Uri(text)
            }
            (Self::BigInteger, Value::Integer(v)) => Value::BigInteger(BigInt::from(v)),
            (Self::BigDecimal, Value::Integer(v)) => Value::BigDecimal(BigDecimal::from(v)),
            (Self::BigDecimal, Value::BigInteger(v)) => Value::BigDecimal(BigDecimal::new(v, 0)),
            (Self::Clob, Value::String(text)) => Value::Clob(text),
            (Self::String, Value::Clob(text)) => Value::String(text),
            (_, value) if value.property_type() == self => value,
            _ => {
                return Err(ValidationError::TypeMismatch {
                    property: property.to_string(),
                    expected: self,
                    actual,
                })
            }
        };
        Ok(coerced)
    }
}

impl Display for PropertyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One non-null scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    BigInteger(BigInt),
    BigDecimal(BigDecimal),
    Timestamp(DateTime<Utc>),
    Uri(String),
    Uuid(Uuid),
    Clob(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Integer(_) => PropertyType::Integer,
            Self::Float(_) => PropertyType::Float,
            Self::Boolean(_) => PropertyType::Boolean,
            Self::String(_) => PropertyType::String,
            Self::BigInteger(_) => PropertyType::BigInteger,
            Self::BigDecimal(_) => PropertyType::BigDecimal,
            Self::Timestamp(_) => PropertyType::Timestamp,
            Self::Uri(_) => PropertyType::Uri,
            Self::Uuid(_) => PropertyType::Uuid,
            Self::Clob(_) => PropertyType::Clob,
            Self::Blob(_) => PropertyType::Blob,
        }
    }

    /// Canonical text form. Blobs are lowercase hex.
    pub fn to_canonical_text(&self) -> String {
        match self {
            Self::Integer(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Boolean(v) => v.to_string(),
            Self::String(v) | Self::Uri(v) | Self::Clob(v) => v.clone(),
            Self::BigInteger(v) => v.to_string(),
            Self::BigDecimal(v) => v.to_string(),
            Self::Timestamp(v) => v.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Self::Uuid(v) => v.hyphenated().to_string(),
            Self::Blob(v) => hex::encode(v),
        }
    }

    /// Parses canonical text produced by [`Value::to_canonical_text`].
    pub fn parse_canonical(property_type: PropertyType, text: &str) -> Result<Self, ValidationError> {
        let invalid = |message: String| ValidationError::InvalidValue {
            property_type,
            text: text.to_string(),
            message,
        };
        let value = match property_type {
            PropertyType::Integer => {
                Self::Integer(text.parse::<i64>().map_err(|err| invalid(err.to_string()))?)
            }
            PropertyType::Float => {
                Self::Float(text.parse::<f64>().map_err(|err| invalid(err.to_string()))?)
            }
            PropertyType::Boolean => match text {
                "true" => Self::Boolean(true),
                "false" => Self::Boolean(false),
                _ => return Err(invalid("expected `true` or `false`".to_string())),
            },
            PropertyType::String => Self::String(text.to_string()),
            PropertyType::Clob => Self::Clob(text.to_string()),
            PropertyType::Uri => PropertyType::Uri.coerce("", Self::Uri(text.to_string()))?,
            PropertyType::BigInteger => {
                Self::BigInteger(BigInt::from_str(text).map_err(|err| invalid(err.to_string()))?)
            }
            PropertyType::BigDecimal => Self::BigDecimal(
                BigDecimal::from_str(text).map_err(|err| invalid(err.to_string()))?,
            ),
            PropertyType::Timestamp => Self::Timestamp(
                DateTime::parse_from_rfc3339(text)
                    .map_err(|err| invalid(err.to_string()))?
                    .with_timezone(&Utc),
            ),
            PropertyType::Uuid => {
                Self::Uuid(Uuid::parse_str(text).map_err(|err| invalid(err.to_string()))?)
            }
            PropertyType::Blob => {
                Self::Blob(hex::decode(text).map_err(|err| invalid(err.to_string()))?)
            }
        };
        Ok(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<BigDecimal> for Value {
    fn from(value: BigDecimal) -> Self {
        Self::BigDecimal(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

/// Value slot of one property inside an aspect.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropertyValue {
    #[default]
    Null,
    Single(Value),
    Multi(Vec<Value>),
}

impl PropertyValue {
    pub fn single(value: impl Into<Value>) -> Self {
        Self::Single(value.into())
    }

    pub fn multi<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Multi(values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_single(&self) -> Option<&Value> {
        match self {
            Self::Single(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_multi(&self) -> Option<&[Value]> {
        match self {
            Self::Multi(values) => Some(values),
            _ => None,
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for PropertyValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Single(value.into()),
            None => Self::Null,
        }
    }
}
