//! Conversions between model values and SQLite column values.

use crate::model::entity::Entity;
use crate::model::value::{PropertyType, PropertyValue, Value};
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value as SqlValue;
use uuid::Uuid;

pub(crate) fn uuid_text(id: Uuid) -> String {
    id.hyphenated().to_string()
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_entity(value: &str, column: &str) -> RepoResult<Entity> {
    parse_uuid(value, column).map(Entity::from_uuid)
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "expected 0 or 1 in {column}, got {other}"
        ))),
    }
}

/// Native column value for a custom-table cell.
pub(crate) fn value_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Boolean(v) => SqlValue::Integer(bool_to_int(*v)),
        Value::Float(v) => SqlValue::Real(*v),
        Value::Blob(bytes) => SqlValue::Blob(bytes.clone()),
        other => SqlValue::Text(other.to_canonical_text()),
    }
}

pub(crate) fn property_value_to_sql(property: &str, value: &PropertyValue) -> RepoResult<SqlValue> {
    match value {
        PropertyValue::Null => Ok(SqlValue::Null),
        PropertyValue::Single(value) => Ok(value_to_sql(value)),
        PropertyValue::Multi(_) => Err(RepoError::InvalidData(format!(
            "multivalued value for mapped column `{property}`"
        ))),
    }
}

/// Reads a custom-table cell back into a value of `property_type`.
pub(crate) fn value_from_sql(
    property_type: PropertyType,
    cell: SqlValue,
    column: &str,
) -> RepoResult<PropertyValue> {
    let mismatch = |found: &str| {
        RepoError::InvalidData(format!(
            "column `{column}` holds {found}, expected {property_type}"
        ))
    };
    let value = match (property_type, cell) {
        (_, SqlValue::Null) => return Ok(PropertyValue::Null),
        (PropertyType::Integer, SqlValue::Integer(v)) => Value::Integer(v),
        (PropertyType::Boolean, SqlValue::Integer(v)) => Value::Boolean(int_to_bool(v, column)?),
        (PropertyType::Float, SqlValue::Real(v)) => Value::Float(v),
        (PropertyType::Float, SqlValue::Integer(v)) => Value::Float(v as f64),
        (PropertyType::Blob, SqlValue::Blob(bytes)) => Value::Blob(bytes),
        (ty, SqlValue::Text(text)) if !ty.is_binary() => Value::parse_canonical(ty, &text)
            .map_err(|err| RepoError::InvalidData(format!("column `{column}`: {err}")))?,
        (_, SqlValue::Integer(_)) => return Err(mismatch("an integer")),
        (_, SqlValue::Real(_)) => return Err(mismatch("a real")),
        (_, SqlValue::Text(_)) => return Err(mismatch("text")),
        (_, SqlValue::Blob(_)) => return Err(mismatch("a blob")),
    };
    Ok(PropertyValue::Single(value))
}

#[cfg(test)]
mod tests {
    use super::{int_to_bool, value_from_sql, value_to_sql};
    use crate::model::value::{PropertyType, PropertyValue, Value};
    use rusqlite::types::Value as SqlValue;

    #[test]
    fn native_types_map_to_native_columns() {
        assert_eq!(value_to_sql(&Value::Integer(3)), SqlValue::Integer(3));
        assert_eq!(value_to_sql(&Value::Boolean(true)), SqlValue::Integer(1));
        assert_eq!(value_to_sql(&Value::Float(0.5)), SqlValue::Real(0.5));
        assert_eq!(
            value_to_sql(&Value::Blob(vec![1, 2])),
            SqlValue::Blob(vec![1, 2])
        );
        assert_eq!(
            value_to_sql(&Value::String("x".to_string())),
            SqlValue::Text("x".to_string())
        );
    }

    #[test]
    fn cells_read_back_by_declared_type() {
        assert_eq!(
            value_from_sql(PropertyType::Boolean, SqlValue::Integer(0), "c").unwrap(),
            PropertyValue::single(false)
        );
        assert_eq!(
            value_from_sql(PropertyType::Integer, SqlValue::Null, "c").unwrap(),
            PropertyValue::Null
        );
        assert!(value_from_sql(PropertyType::Integer, SqlValue::Text("x".into()), "c").is_err());
        assert!(value_from_sql(PropertyType::Blob, SqlValue::Text("00".into()), "c").is_err());
        assert!(int_to_bool(2, "c").is_err());
    }
}
