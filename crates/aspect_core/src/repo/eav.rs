//! Entity-attribute-value encoding of aspect properties.
//!
//! # Invariants
//! - Single-valued: exactly one row at index 0; a null value has both value
//!   columns null.
//! - Multivalued: one row per element, index = position. Null and empty
//!   both produce zero rows and both decode as an empty sequence.
//! - Blobs use `value_binary`; every other type uses canonical text.

use crate::model::aspect::Aspect;
use crate::model::aspect_def::AspectDef;
use crate::model::error::ValidationError;
use crate::model::property_def::PropertyDef;
use crate::model::value::{PropertyValue, Value};
use crate::repo::{RepoError, RepoResult};
use log::warn;
use std::collections::HashMap;

/// One stored scalar of one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EavRow {
    pub property_name: String,
    pub value_index: i64,
    pub value_text: Option<String>,
    pub value_binary: Option<Vec<u8>>,
}

impl EavRow {
    fn null(property_name: &str) -> Self {
        Self {
            property_name: property_name.to_string(),
            value_index: 0,
            value_text: None,
            value_binary: None,
        }
    }

    fn scalar(property_name: &str, value_index: i64, value: &Value) -> Self {
        let (value_text, value_binary) = match value {
            Value::Blob(bytes) => (None, Some(bytes.clone())),
            other => (Some(other.to_canonical_text()), None),
        };
        Self {
            property_name: property_name.to_string(),
            value_index,
            value_text,
            value_binary,
        }
    }

    fn is_null(&self) -> bool {
        self.value_text.is_none() && self.value_binary.is_none()
    }
}

pub fn encode_property(
    property: &PropertyDef,
    value: &PropertyValue,
) -> Result<Vec<EavRow>, ValidationError> {
    let name = property.name();
    match (property.is_multivalued(), value) {
        (false, PropertyValue::Null) if !property.is_nullable() => {
            Err(ValidationError::NullNotAllowed {
                property: name.to_string(),
            })
        }
        (false, PropertyValue::Null) => Ok(vec![EavRow::null(name)]),
        (false, PropertyValue::Single(value)) => Ok(vec![EavRow::scalar(name, 0, value)]),
        (false, PropertyValue::Multi(_)) => Err(ValidationError::ExpectedSingleValued {
            property: name.to_string(),
        }),
        (true, PropertyValue::Null) => Ok(Vec::new()),
        (true, PropertyValue::Multi(values)) => Ok(values
            .iter()
            .enumerate()
            .map(|(index, value)| EavRow::scalar(name, index as i64, value))
            .collect()),
        (true, PropertyValue::Single(_)) => Err(ValidationError::ExpectedMultivalued {
            property: name.to_string(),
        }),
    }
}

/// Rows for every property of `aspect`, in definition order.
pub fn encode_aspect(aspect: &dyn Aspect) -> Result<Vec<EavRow>, ValidationError> {
    let def = aspect.def();
    let mut rows = Vec::new();
    for (name, value) in aspect.snapshot() {
        let property = def.require_property(&name)?;
        rows.extend(encode_property(property, &value)?);
    }
    Ok(rows)
}

/// Rebuilds property values from stored rows, in definition order.
///
/// Single-valued properties without any row are left out; multivalued
/// properties without rows decode as an empty sequence.
pub fn decode_properties(
    def: &AspectDef,
    rows: Vec<EavRow>,
) -> RepoResult<Vec<(String, PropertyValue)>> {
    let mut by_property: HashMap<String, Vec<EavRow>> = HashMap::new();
    for row in rows {
        by_property
            .entry(row.property_name.clone())
            .or_default()
            .push(row);
    }

    let mut values = Vec::with_capacity(def.properties().len());
    for property in def.properties() {
        let mut rows = by_property.remove(property.name()).unwrap_or_default();
        rows.sort_by_key(|row| row.value_index);
        if property.is_multivalued() {
            let elements = rows
                .iter()
                .map(|row| decode_scalar(def, property, row))
                .collect::<RepoResult<Vec<_>>>()?;
            values.push((property.name().to_string(), PropertyValue::Multi(elements)));
            continue;
        }
        match rows.as_slice() {
            [] => {}
            [row] if row.value_index == 0 => {
                let value = if row.is_null() {
                    PropertyValue::Null
                } else {
                    PropertyValue::Single(decode_scalar(def, property, row)?)
                };
                values.push((property.name().to_string(), value));
            }
            _ => {
                return Err(RepoError::InvalidData(format!(
                    "single-valued property `{}.{}` has {} rows",
                    def.name(),
                    property.name(),
                    rows.len()
                )))
            }
        }
    }

    for name in by_property.keys() {
        warn!(
            "event=eav_decode module=repo status=skip aspect_def={} property={} reason=unknown_property",
            def.name(),
            name
        );
    }
    Ok(values)
}

fn decode_scalar(def: &AspectDef, property: &PropertyDef, row: &EavRow) -> RepoResult<Value> {
    let invalid = |message: String| {
        RepoError::InvalidData(format!(
            "property `{}.{}` index {}: {message}",
            def.name(),
            property.name(),
            row.value_index
        ))
    };
    let property_type = property.property_type();
    match (&row.value_text, &row.value_binary) {
        (None, Some(bytes)) if property_type.is_binary() => Ok(Value::Blob(bytes.clone())),
        (Some(text), None) if !property_type.is_binary() => {
            Value::parse_canonical(property_type, text).map_err(|err| invalid(err.to_string()))
        }
        (None, None) => Err(invalid("null element".to_string())),
        _ => Err(invalid(format!("value column does not fit {property_type}"))),
    }
}
