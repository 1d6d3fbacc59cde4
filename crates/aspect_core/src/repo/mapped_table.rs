//! Execution of custom-table statements on SQLite.
//!
//! # Invariants
//! - Parameters follow the column order of `TableMapping::write_columns`.
//! - Every value is validated against its property before it is bound.
//! - Reads go page by page; a short page ends the scan.

use crate::db::Dialect;
use crate::model::aspect::Aspect;
use crate::model::catalog::CatalogId;
use crate::model::entity::Entity;
use crate::model::value::PropertyValue;
use crate::repo::codec::{parse_entity, property_value_to_sql, uuid_text, value_from_sql};
use crate::repo::mapping::TableMapping;
use crate::repo::{RepoError, RepoResult};
use log::info;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;

const DIALECT: Dialect = Dialect::Sqlite;

/// One decoded row of a custom table.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    /// `None` when the table has no entity column.
    pub entity: Option<Entity>,
    pub values: Vec<(String, PropertyValue)>,
}

pub fn create_table(conn: &Connection, mapping: &TableMapping) -> RepoResult<()> {
    conn.execute_batch(&mapping.create_table_sql(DIALECT))?;
    info!(
        "event=mapped_table_create module=repo status=ok table={} pattern={:?}",
        mapping.table(),
        mapping.pattern()
    );
    Ok(())
}

fn catalog_param(mapping: &TableMapping, catalog_id: CatalogId) -> Vec<SqlValue> {
    if mapping.pattern().has_catalog_column() {
        vec![SqlValue::Text(uuid_text(catalog_id))]
    } else {
        Vec::new()
    }
}

/// Writes one row per aspect. Returns the number of rows written.
pub fn write_aspects(
    conn: &Connection,
    mapping: &TableMapping,
    catalog_id: CatalogId,
    aspects: &[&dyn Aspect],
) -> RepoResult<usize> {
    let sql = mapping.write_sql(DIALECT);
    let mut stmt = conn.prepare(&sql)?;
    for aspect in aspects {
        let mut params = catalog_param(mapping, catalog_id);
        if mapping.pattern().has_entity_column() {
            params.push(SqlValue::Text(uuid_text(aspect.entity().id())));
        }
        let snapshot: HashMap<String, PropertyValue> = aspect.snapshot().into_iter().collect();
        for (property, _) in mapping.columns() {
            let value = snapshot.get(property).cloned().unwrap_or_default();
            let value = aspect.def().require_property(property)?.validate(value)?;
            params.push(property_value_to_sql(property, &value)?);
        }
        stmt.execute(params_from_iter(params.iter()))?;
    }
    Ok(aspects.len())
}

/// Deletes the rows of `entities`; a no-op for tables without an entity
/// column.
pub fn delete_entities(
    conn: &Connection,
    mapping: &TableMapping,
    catalog_id: CatalogId,
    entities: &[Entity],
) -> RepoResult<usize> {
    let Some(sql) = mapping.delete_entity_sql(DIALECT) else {
        return Ok(0);
    };
    let mut stmt = conn.prepare(&sql)?;
    let mut removed = 0;
    for entity in entities {
        let mut params = catalog_param(mapping, catalog_id);
        params.push(SqlValue::Text(uuid_text(entity.id())));
        removed += stmt.execute(params_from_iter(params.iter()))?;
    }
    Ok(removed)
}

/// Clears one catalog's rows, or the whole table when it has no catalog
/// column.
pub fn clear(conn: &Connection, mapping: &TableMapping, catalog_id: CatalogId) -> RepoResult<usize> {
    let params = catalog_param(mapping, catalog_id);
    let removed = conn.execute(&mapping.clear_sql(DIALECT), params_from_iter(params.iter()))?;
    info!(
        "event=mapped_table_clear module=repo status=ok table={} pattern={:?} rows={}",
        mapping.table(),
        mapping.pattern(),
        removed
    );
    Ok(removed)
}

/// Reads every row visible to `catalog_id`, `page_size` rows at a time.
pub fn read_rows(
    conn: &Connection,
    mapping: &TableMapping,
    catalog_id: CatalogId,
    page_size: u32,
) -> RepoResult<Vec<MappedRow>> {
    let sql = mapping.select_page_sql(DIALECT);
    let mut stmt = conn.prepare(&sql)?;
    let has_entity = mapping.pattern().has_entity_column();
    let width = mapping.read_columns().len();
    let page_size = i64::from(page_size.max(1));

    let mut decoded = Vec::new();
    let mut offset: i64 = 0;
    loop {
        let mut params = catalog_param(mapping, catalog_id);
        params.push(SqlValue::Integer(page_size));
        params.push(SqlValue::Integer(offset));

        let mut page = Vec::new();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for index in 0..width {
                cells.push(row.get::<_, SqlValue>(index)?);
            }
            page.push(cells);
        }
        drop(rows);

        let fetched = page.len() as i64;
        for cells in page {
            decoded.push(decode_row(mapping, has_entity, cells)?);
        }
        if fetched < page_size {
            break;
        }
        offset += fetched;
    }
    Ok(decoded)
}

fn decode_row(mapping: &TableMapping, has_entity: bool, cells: Vec<SqlValue>) -> RepoResult<MappedRow> {
    let mut cells = cells.into_iter();
    let entity = if has_entity {
        match cells.next() {
            Some(SqlValue::Text(text)) => Some(parse_entity(&text, mapping.table())?),
            other => {
                return Err(RepoError::InvalidData(format!(
                    "entity column of `{}` holds {other:?}",
                    mapping.table()
                )))
            }
        }
    } else {
        None
    };

    let def = mapping.aspect_def();
    let mut values = Vec::with_capacity(mapping.columns().len());
    for ((property, column), cell) in mapping.columns().iter().zip(cells) {
        let property_def = def.require_property(property)?;
        let value = value_from_sql(property_def.property_type(), cell, column)?;
        values.push((property.clone(), value));
    }
    Ok(MappedRow { entity, values })
}
