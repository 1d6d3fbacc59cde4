//! Property descriptors.
//!
//! # Responsibility
//! - Describe one named, typed slot of an aspect together with its
//!   permission and multiplicity flags.
//! - Validate candidate values against that description.
//!
//! # Invariants
//! - Built definitions are immutable; the structural hash is computed once
//!   at build time.
//! - Multivalued properties never declare a default value.
//! - A non-nullable property never declares a null default.

use crate::model::error::ValidationError;
use crate::model::hash::StructuralHasher;
use crate::model::value::{PropertyType, PropertyValue, Value};
use once_cell::sync::Lazy;
use regex::Regex;

pub(crate) const MAX_NAME_LEN: usize = 128;

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.:-]*$").expect("valid name regex"));

/// Checks a schema name (property, aspect def or hierarchy).
pub(crate) fn validate_name(kind: &'static str, name: &str) -> Result<(), ValidationError> {
    if name.len() > MAX_NAME_LEN || !NAME_RE.is_match(name) {
        return Err(ValidationError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Structural description of a single property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    name: String,
    property_type: PropertyType,
    /// `Some(PropertyValue::Null)` is an explicit null default.
    default: Option<PropertyValue>,
    readable: bool,
    writable: bool,
    nullable: bool,
    removable: bool,
    multivalued: bool,
    hash: u64,
}

impl PropertyDef {
    pub fn builder(name: impl Into<String>, property_type: PropertyType) -> PropertyDefBuilder {
        PropertyDefBuilder {
            name: name.into(),
            property_type,
            default: None,
            readable: true,
            writable: true,
            nullable: true,
            removable: true,
            multivalued: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    pub fn default_value(&self) -> Option<&PropertyValue> {
        self.default.as_ref()
    }

    pub fn has_default_value(&self) -> bool {
        self.default.is_some()
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_removable(&self) -> bool {
        self.removable
    }

    pub fn is_multivalued(&self) -> bool {
        self.multivalued
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Basic identity: two definitions with the same name describe the same
    /// slot, whatever their flags.
    pub fn same_name(&self, other: &PropertyDef) -> bool {
        self.name == other.name
    }

    /// Value a freshly created aspect holds for this property.
    pub fn initial_value(&self) -> PropertyValue {
        match &self.default {
            Some(value) => value.clone(),
            None if self.multivalued => PropertyValue::Multi(Vec::new()),
            None => PropertyValue::Null,
        }
    }

    /// Checks shape, type and nullability, returning the coerced value.
    pub fn validate(&self, value: PropertyValue) -> Result<PropertyValue, ValidationError> {
        match value {
            PropertyValue::Null => {
                if !self.nullable {
                    return Err(ValidationError::NullNotAllowed {
                        property: self.name.clone(),
                    });
                }
                Ok(PropertyValue::Null)
            }
            PropertyValue::Single(value) => {
                if self.multivalued {
                    return Err(ValidationError::ExpectedMultivalued {
                        property: self.name.clone(),
                    });
                }
                Ok(PropertyValue::Single(
                    self.property_type.coerce(&self.name, value)?,
                ))
            }
            PropertyValue::Multi(values) => {
                if !self.multivalued {
                    return Err(ValidationError::ExpectedSingleValued {
                        property: self.name.clone(),
                    });
                }
                let coerced = values
                    .into_iter()
                    .map(|value| self.property_type.coerce(&self.name, value))
                    .collect::<Result<Vec<Value>, _>>()?;
                Ok(PropertyValue::Multi(coerced))
            }
        }
    }

    fn compute_hash(&self) -> u64 {
        let mut hasher = StructuralHasher::new("property_def");
        hasher.write_str(&self.name);
        hasher.write_str(self.property_type.as_str());
        hasher.write_bool(self.default.is_some());
        let default_text = match &self.default {
            Some(PropertyValue::Single(value)) => Some(hash_text(value)),
            _ => None,
        };
        hasher.write_option_str(default_text.as_deref());
        hasher.write_bool(self.readable);
        hasher.write_bool(self.writable);
        hasher.write_bool(self.nullable);
        hasher.write_bool(self.removable);
        hasher.write_bool(self.multivalued);
        hasher.finish()
    }
}

/// Text of a default as seen by the hash: values that compare equal must
/// produce the same text.
fn hash_text(value: &Value) -> String {
    match value {
        Value::BigDecimal(v) => v.normalized().to_string(),
        Value::Float(v) if *v == 0.0 => "0".to_string(),
        other => other.to_canonical_text(),
    }
}

/// Builder for [`PropertyDef`]; flags default to permissive single-valued.
#[derive(Debug, Clone)]
pub struct PropertyDefBuilder {
    name: String,
    property_type: PropertyType,
    default: Option<PropertyValue>,
    readable: bool,
    writable: bool,
    nullable: bool,
    removable: bool,
    multivalued: bool,
}

impl PropertyDefBuilder {
    pub fn readable(mut self, readable: bool) -> Self {
        self.readable = readable;
        self
    }

    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn removable(mut self, removable: bool) -> Self {
        self.removable = removable;
        self
    }

    pub fn multivalued(mut self, multivalued: bool) -> Self {
        self.multivalued = multivalued;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(PropertyValue::Single(value.into()));
        self
    }

    pub fn default_null(mut self) -> Self {
        self.default = Some(PropertyValue::Null);
        self
    }

    pub fn build(self) -> Result<PropertyDef, ValidationError> {
        validate_name("property", &self.name)?;
        let invalid_default = |message: &str| ValidationError::InvalidDefault {
            property: self.name.clone(),
            message: message.to_string(),
        };
        let default = match self.default.clone() {
            None => None,
            Some(_) if self.multivalued => {
                return Err(invalid_default("multivalued properties cannot declare defaults"))
            }
            Some(PropertyValue::Null) if !self.nullable => {
                return Err(invalid_default("null default on a non-nullable property"))
            }
            Some(PropertyValue::Null) => Some(PropertyValue::Null),
            Some(PropertyValue::Single(value)) => Some(PropertyValue::Single(
                self.property_type
                    .coerce(&self.name, value)
                    .map_err(|err| invalid_default(&err.to_string()))?,
            )),
            Some(PropertyValue::Multi(_)) => {
                return Err(invalid_default("defaults must be scalar"))
            }
        };

        let mut def = PropertyDef {
            name: self.name,
            property_type: self.property_type,
            default,
            readable: self.readable,
            writable: self.writable,
            nullable: self.nullable,
            removable: self.removable,
            multivalued: self.multivalued,
            hash: 0,
        };
        def.hash = def.compute_hash();
        Ok(def)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_name, PropertyDef};
    use crate::model::error::ValidationError;
    use crate::model::value::{PropertyType, PropertyValue, Value};
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    #[test]
    fn numerically_equal_defaults_hash_alike() {
        let amount = |text: &str| {
            PropertyDef::builder("amount", PropertyType::BigDecimal)
                .default_value(BigDecimal::from_str(text).unwrap())
                .build()
                .unwrap()
        };
        assert_eq!(amount("5").hash(), amount("5.0").hash());
        assert_eq!(amount("5"), amount("5.00"));
        assert_ne!(amount("5").hash(), amount("5.1").hash());

        let ratio = |value: f64| {
            PropertyDef::builder("ratio", PropertyType::Float)
                .default_value(value)
                .build()
                .unwrap()
        };
        assert_eq!(ratio(0.0), ratio(-0.0));
    }

    #[test]
    fn builder_defaults_are_permissive() {
        let def = PropertyDef::builder("name", PropertyType::String)
            .build()
            .unwrap();
        assert!(def.is_readable());
        assert!(def.is_writable());
        assert!(def.is_nullable());
        assert!(def.is_removable());
        assert!(!def.is_multivalued());
        assert!(!def.has_default_value());
    }

    #[test]
    fn names_are_validated() {
        assert!(validate_name("property", "first_name").is_ok());
        assert!(validate_name("property", "ns:thing.v2").is_ok());
        assert!(validate_name("property", "1abc").is_err());
        assert!(validate_name("property", "").is_err());
        assert!(validate_name("property", &"a".repeat(129)).is_err());
        assert!(PropertyDef::builder("has space", PropertyType::String)
            .build()
            .is_err());
    }

    #[test]
    fn multivalued_default_is_rejected() {
        let err = PropertyDef::builder("tags", PropertyType::String)
            .multivalued(true)
            .default_value("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDefault { .. }));
    }

    #[test]
    fn null_default_needs_nullable() {
        assert!(PropertyDef::builder("age", PropertyType::Integer)
            .nullable(false)
            .default_null()
            .build()
            .is_err());
        let def = PropertyDef::builder("age", PropertyType::Integer)
            .default_null()
            .build()
            .unwrap();
        assert_eq!(def.default_value(), Some(&PropertyValue::Null));
    }

    #[test]
    fn default_is_coerced_to_declared_type() {
        let def = PropertyDef::builder("total", PropertyType::BigDecimal)
            .default_value(5_i64)
            .build()
            .unwrap();
        assert!(matches!(
            def.default_value(),
            Some(PropertyValue::Single(Value::BigDecimal(_)))
        ));
        assert!(PropertyDef::builder("total", PropertyType::Integer)
            .default_value("five")
            .build()
            .is_err());
    }

    #[test]
    fn validate_checks_shape() {
        let single = PropertyDef::builder("a", PropertyType::Integer)
            .build()
            .unwrap();
        let multi = PropertyDef::builder("b", PropertyType::Integer)
            .multivalued(true)
            .build()
            .unwrap();
        assert!(single.validate(PropertyValue::single(1_i64)).is_ok());
        assert!(matches!(
            single.validate(PropertyValue::multi([1_i64])),
            Err(ValidationError::ExpectedSingleValued { .. })
        ));
        assert!(matches!(
            multi.validate(PropertyValue::single(1_i64)),
            Err(ValidationError::ExpectedMultivalued { .. })
        ));
        assert_eq!(multi.initial_value(), PropertyValue::Multi(Vec::new()));
    }

    #[test]
    fn hash_tracks_every_flag() {
        let base = PropertyDef::builder("a", PropertyType::Integer)
            .build()
            .unwrap();
        let variants = [
            PropertyDef::builder("a", PropertyType::Integer).readable(false),
            PropertyDef::builder("a", PropertyType::Integer).writable(false),
            PropertyDef::builder("a", PropertyType::Integer).nullable(false),
            PropertyDef::builder("a", PropertyType::Integer).removable(false),
            PropertyDef::builder("a", PropertyType::Integer).multivalued(true),
            PropertyDef::builder("a", PropertyType::Integer).default_value(1_i64),
            PropertyDef::builder("a", PropertyType::Integer).default_null(),
            PropertyDef::builder("a", PropertyType::Float),
            PropertyDef::builder("b", PropertyType::Integer),
        ];
        for builder in variants {
            let other = builder.build().unwrap();
            assert_ne!(base.hash(), other.hash(), "{other:?}");
            assert!(base != other);
        }
    }
}
