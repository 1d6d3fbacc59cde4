//! Rows of `aspect_def`, `property_def` and `catalog_aspect_def`.
//!
//! # Invariants
//! - Definition names are unique across the store. A second definition
//!   with the same name is accepted only when it is structurally identical,
//!   in which case the stored id is reused.
//! - Property rows carry their position so load restores definition order.
//! - The stored hash must equal the hash recomputed on load.

use crate::model::aspect_def::{AspectCapabilities, AspectDef};
use crate::model::catalog::CatalogId;
use crate::model::error::ValidationError;
use crate::model::property_def::PropertyDef;
use crate::model::value::{PropertyType, PropertyValue, Value};
use crate::repo::codec::{bool_to_int, int_to_bool, parse_uuid, uuid_text};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Hashes are stored bit for bit in a signed column.
fn stored_hash(def: &AspectDef) -> i64 {
    def.hash() as i64
}

/// Writes `def` and its properties. Returns the id the definition is stored
/// under.
pub(crate) fn upsert_aspect_def(conn: &Connection, def: &AspectDef) -> RepoResult<Uuid> {
    let existing: Option<(String, i64)> = conn
        .query_row(
            "SELECT aspect_def_id, hash FROM aspect_def WHERE name = ?1;",
            [def.name()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    if let Some((stored_id, hash)) = existing {
        let stored_id = parse_uuid(&stored_id, "aspect_def.aspect_def_id")?;
        if stored_id != def.global_id() {
            if hash == stored_hash(def) {
                return Ok(stored_id);
            }
            return Err(ValidationError::ConflictingAspectDef {
                name: def.name().to_string(),
            }
            .into());
        }
    }

    let id = uuid_text(def.global_id());
    conn.execute(
        "INSERT INTO aspect_def (
            aspect_def_id, name, hash, is_readable, is_writable,
            can_add_properties, can_remove_properties
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (aspect_def_id) DO UPDATE SET
            name = excluded.name,
            hash = excluded.hash,
            is_readable = excluded.is_readable,
            is_writable = excluded.is_writable,
            can_add_properties = excluded.can_add_properties,
            can_remove_properties = excluded.can_remove_properties;",
        params![
            id,
            def.name(),
            stored_hash(def),
            bool_to_int(def.is_readable()),
            bool_to_int(def.is_writable()),
            bool_to_int(def.can_add_properties()),
            bool_to_int(def.can_remove_properties()),
        ],
    )?;

    conn.execute("DELETE FROM property_def WHERE aspect_def_id = ?1;", [&id])?;
    let mut insert = conn.prepare(
        "INSERT INTO property_def (
            aspect_def_id, name, property_index, property_type, default_value,
            has_default_value, is_readable, is_writable, is_nullable,
            is_removable, is_multivalued
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
    )?;
    for (index, property) in def.properties().iter().enumerate() {
        let default_text = match property.default_value() {
            Some(PropertyValue::Single(value)) => Some(value.to_canonical_text()),
            _ => None,
        };
        insert.execute(params![
            id,
            property.name(),
            index as i64,
            property.property_type().as_str(),
            default_text,
            bool_to_int(property.has_default_value()),
            bool_to_int(property.is_readable()),
            bool_to_int(property.is_writable()),
            bool_to_int(property.is_nullable()),
            bool_to_int(property.is_removable()),
            bool_to_int(property.is_multivalued()),
        ])?;
    }
    Ok(def.global_id())
}

/// Replaces the definition links of a catalog, keeping the given order.
pub(crate) fn link_aspect_defs(
    conn: &Connection,
    catalog_id: CatalogId,
    aspect_def_ids: &[Uuid],
) -> RepoResult<()> {
    let catalog = uuid_text(catalog_id);
    conn.execute(
        "DELETE FROM catalog_aspect_def WHERE catalog_id = ?1;",
        [&catalog],
    )?;
    let mut insert = conn.prepare(
        "INSERT OR IGNORE INTO catalog_aspect_def (catalog_id, aspect_def_id) VALUES (?1, ?2);",
    )?;
    for id in aspect_def_ids {
        insert.execute(params![catalog, uuid_text(*id)])?;
    }
    Ok(())
}

struct AspectDefRow {
    id: String,
    name: String,
    hash: i64,
    flags: [i64; 4],
}

struct PropertyDefRow {
    name: String,
    property_type: String,
    default_value: Option<String>,
    flags: [i64; 6],
}

/// Definitions linked to `catalog_id`, in link order. Each comes back with
/// its stored id.
pub(crate) fn load_linked_aspect_defs(
    conn: &Connection,
    catalog_id: CatalogId,
) -> RepoResult<Vec<AspectDef>> {
    let mut stmt = conn.prepare(
        "SELECT d.aspect_def_id, d.name, d.hash, d.is_readable, d.is_writable,
                d.can_add_properties, d.can_remove_properties
         FROM catalog_aspect_def cad
         JOIN aspect_def d ON d.aspect_def_id = cad.aspect_def_id
         WHERE cad.catalog_id = ?1
         ORDER BY cad.rowid ASC;",
    )?;
    let rows = stmt
        .query_map([uuid_text(catalog_id)], |row| {
            Ok(AspectDefRow {
                id: row.get(0)?,
                name: row.get(1)?,
                hash: row.get(2)?,
                flags: [row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?],
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|row| decode_aspect_def(conn, row))
        .collect()
}

fn decode_aspect_def(conn: &Connection, row: AspectDefRow) -> RepoResult<AspectDef> {
    let id = parse_uuid(&row.id, "aspect_def.aspect_def_id")?;
    let [readable, writable, can_add, can_remove] = row.flags;
    let capabilities = AspectCapabilities {
        readable: int_to_bool(readable, "aspect_def.is_readable")?,
        writable: int_to_bool(writable, "aspect_def.is_writable")?,
        can_add_properties: int_to_bool(can_add, "aspect_def.can_add_properties")?,
        can_remove_properties: int_to_bool(can_remove, "aspect_def.can_remove_properties")?,
    };

    let mut stmt = conn.prepare(
        "SELECT name, property_type, default_value, has_default_value, is_readable,
                is_writable, is_nullable, is_removable, is_multivalued
         FROM property_def
         WHERE aspect_def_id = ?1
         ORDER BY property_index ASC;",
    )?;
    let property_rows = stmt
        .query_map([&row.id], |r| {
            Ok(PropertyDefRow {
                name: r.get(0)?,
                property_type: r.get(1)?,
                default_value: r.get(2)?,
                flags: [
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                    r.get(7)?,
                    r.get(8)?,
                ],
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let properties = property_rows
        .into_iter()
        .map(|property| decode_property_def(&row.name, property))
        .collect::<RepoResult<Vec<_>>>()?;

    let def = AspectDef::new(row.name.as_str(), id, properties, capabilities).map_err(|err| {
        RepoError::InvalidData(format!("aspect def `{}`: {err}", row.name))
    })?;
    if stored_hash(&def) != row.hash {
        return Err(RepoError::InvalidData(format!(
            "aspect def `{}` hash mismatch: stored {}, computed {}",
            row.name,
            row.hash,
            stored_hash(&def)
        )));
    }
    Ok(def)
}

fn decode_property_def(aspect_def: &str, row: PropertyDefRow) -> RepoResult<PropertyDef> {
    let invalid = |message: String| {
        RepoError::InvalidData(format!("property `{aspect_def}.{}`: {message}", row.name))
    };
    let property_type = PropertyType::parse(&row.property_type)
        .ok_or_else(|| invalid(format!("unknown property type `{}`", row.property_type)))?;
    let [has_default, readable, writable, nullable, removable, multivalued] = row.flags;

    let mut builder = PropertyDef::builder(row.name.as_str(), property_type)
        .readable(int_to_bool(readable, "property_def.is_readable")?)
        .writable(int_to_bool(writable, "property_def.is_writable")?)
        .nullable(int_to_bool(nullable, "property_def.is_nullable")?)
        .removable(int_to_bool(removable, "property_def.is_removable")?)
        .multivalued(int_to_bool(multivalued, "property_def.is_multivalued")?);
    if int_to_bool(has_default, "property_def.has_default_value")? {
        builder = match &row.default_value {
            None => builder.default_null(),
            Some(text) => builder.default_value(
                Value::parse_canonical(property_type, text)
                    .map_err(|err| invalid(err.to_string()))?,
            ),
        };
    }
    builder.build().map_err(|err| invalid(err.to_string()))
}
