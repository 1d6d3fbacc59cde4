//! Hierarchy rows and their per-variant content tables.
//!
//! # Invariants
//! - Content is rewritten as a whole on every save.
//! - Aspect data of an aspect map goes to its registered custom table when
//!   one exists, otherwise to `aspect` + `property_value`.
//! - Every referenced entity has a row in `entity`.

use crate::model::aspect::{Aspect, CheckedAspect};
use crate::model::aspect_def::AspectDef;
use crate::model::catalog::CatalogId;
use crate::model::entity::Entity;
use crate::model::hierarchy::{
    AspectMap, EntityDirectory, EntityList, EntitySet, EntityTree, Hierarchy, HierarchyContent,
    HierarchyType,
};
use crate::model::value::PropertyValue;
use crate::repo::codec::{bool_to_int, int_to_bool, parse_entity, parse_uuid, uuid_text};
use crate::repo::context::PersistenceContext;
use crate::repo::eav::{decode_properties, encode_aspect, EavRow};
use crate::repo::mapped_table;
use crate::repo::mapping::TableMapping;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// A persisted `hierarchy` row.
#[derive(Debug, Clone)]
pub(crate) struct HierarchyRow {
    pub name: String,
    pub hierarchy_type: HierarchyType,
    pub version: i64,
    pub aspect_def_id: Option<Uuid>,
    pub is_ordered: bool,
}

pub(crate) fn load_hierarchy_rows(
    conn: &Connection,
    catalog_id: CatalogId,
) -> RepoResult<Vec<HierarchyRow>> {
    let mut stmt = conn.prepare(
        "SELECT name, hierarchy_type, version_number, aspect_def_id, is_ordered
         FROM hierarchy
         WHERE catalog_id = ?1
         ORDER BY rowid ASC;",
    )?;
    let raw = stmt
        .query_map([uuid_text(catalog_id)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(name, kind, version, aspect_def_id, is_ordered)| {
            let hierarchy_type = HierarchyType::parse(&kind).ok_or_else(|| {
                RepoError::InvalidData(format!("unknown hierarchy type `{kind}` for `{name}`"))
            })?;
            let aspect_def_id = aspect_def_id
                .map(|id| parse_uuid(&id, "hierarchy.aspect_def_id"))
                .transpose()?;
            Ok(HierarchyRow {
                name,
                hierarchy_type,
                version,
                aspect_def_id,
                is_ordered: int_to_bool(is_ordered, "hierarchy.is_ordered")?,
            })
        })
        .collect()
}

pub(crate) fn upsert_hierarchy(
    conn: &Connection,
    catalog_id: CatalogId,
    hierarchy: &Hierarchy,
    aspect_def_id: Option<Uuid>,
) -> RepoResult<()> {
    let is_ordered = match hierarchy.content() {
        HierarchyContent::Set(set) => set.is_ordered(),
        _ => false,
    };
    conn.execute(
        "INSERT INTO hierarchy (
            catalog_id, name, hierarchy_type, version_number, aspect_def_id, is_ordered
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (catalog_id, name) DO UPDATE SET
            hierarchy_type = excluded.hierarchy_type,
            version_number = excluded.version_number,
            aspect_def_id = excluded.aspect_def_id,
            is_ordered = excluded.is_ordered;",
        params![
            uuid_text(catalog_id),
            hierarchy.name(),
            hierarchy.hierarchy_type().as_str(),
            hierarchy.version(),
            aspect_def_id.map(uuid_text),
            bool_to_int(is_ordered),
        ],
    )?;
    Ok(())
}

/// Removes a hierarchy row; its content cascades.
pub(crate) fn delete_hierarchy(conn: &Connection, catalog_id: CatalogId, name: &str) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM hierarchy WHERE catalog_id = ?1 AND name = ?2;",
        params![uuid_text(catalog_id), name],
    )?;
    Ok(())
}

/// Entities recorded as aspect-map entries of one hierarchy, in entry order.
pub(crate) fn aspect_map_entities(
    conn: &Connection,
    catalog_id: CatalogId,
    name: &str,
) -> RepoResult<Vec<Entity>> {
    let mut stmt = conn.prepare(
        "SELECT entity_id FROM hierarchy_aspect_map_entry
         WHERE catalog_id = ?1 AND hierarchy_name = ?2
         ORDER BY entry_order ASC;",
    )?;
    let ids = stmt
        .query_map(params![uuid_text(catalog_id), name], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    ids.iter()
        .map(|id| parse_entity(id, "hierarchy_aspect_map_entry.entity_id"))
        .collect()
}

fn ensure_entity(conn: &Connection, entity: Entity) -> RepoResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO entity (entity_id) VALUES (?1);",
        [uuid_text(entity.id())],
    )?;
    Ok(())
}

/// Rewrites the content of `hierarchy`. `aspect_def_id` is the stored id of
/// an aspect map's definition.
pub(crate) fn save_content(
    conn: &Connection,
    ctx: &PersistenceContext,
    catalog_id: CatalogId,
    hierarchy: &Hierarchy,
    aspect_def_id: Option<Uuid>,
) -> RepoResult<()> {
    let catalog = uuid_text(catalog_id);
    let name = hierarchy.name();
    match hierarchy.content() {
        HierarchyContent::List(list) => {
            conn.execute(
                "DELETE FROM hierarchy_list_item WHERE catalog_id = ?1 AND hierarchy_name = ?2;",
                params![catalog, name],
            )?;
            let mut insert = conn.prepare(
                "INSERT INTO hierarchy_list_item (catalog_id, hierarchy_name, item_index, entity_id)
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for (index, entity) in list.entities().iter().enumerate() {
                ensure_entity(conn, *entity)?;
                insert.execute(params![catalog, name, index as i64, uuid_text(entity.id())])?;
            }
        }
        HierarchyContent::Set(set) => {
            conn.execute(
                "DELETE FROM hierarchy_set_item WHERE catalog_id = ?1 AND hierarchy_name = ?2;",
                params![catalog, name],
            )?;
            let mut insert = conn.prepare(
                "INSERT INTO hierarchy_set_item (catalog_id, hierarchy_name, entity_id, sort_order)
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for (index, entity) in set.entities().iter().enumerate() {
                ensure_entity(conn, *entity)?;
                let sort_order = set.is_ordered().then_some(index as i64);
                insert.execute(params![catalog, name, uuid_text(entity.id()), sort_order])?;
            }
        }
        HierarchyContent::Directory(directory) => {
            conn.execute(
                "DELETE FROM hierarchy_directory_entry WHERE catalog_id = ?1 AND hierarchy_name = ?2;",
                params![catalog, name],
            )?;
            let mut insert = conn.prepare(
                "INSERT INTO hierarchy_directory_entry (
                    catalog_id, hierarchy_name, entry_key, entry_order, entity_id
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            for (order, (key, entity)) in directory.iter().enumerate() {
                ensure_entity(conn, entity)?;
                insert.execute(params![catalog, name, key, order as i64, uuid_text(entity.id())])?;
            }
        }
        HierarchyContent::Tree(tree) => {
            conn.execute(
                "DELETE FROM hierarchy_tree_node WHERE catalog_id = ?1 AND hierarchy_name = ?2;",
                params![catalog, name],
            )?;
            let mut insert = conn.prepare(
                "INSERT INTO hierarchy_tree_node (
                    catalog_id, hierarchy_name, node_id, parent_node_id, node_key,
                    node_path, sibling_order, entity_id
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            )?;
            for (node_id, visit) in tree.walk().iter().enumerate() {
                let entity = visit.node.value();
                if let Some(entity) = entity {
                    ensure_entity(conn, entity)?;
                }
                insert.execute(params![
                    catalog,
                    name,
                    node_id as i64,
                    visit.parent_index.map(|index| index as i64),
                    visit.key,
                    visit.path,
                    visit.sibling_order as i64,
                    entity.map(|entity| uuid_text(entity.id())),
                ])?;
            }
        }
        HierarchyContent::AspectMap(map) => {
            let aspect_def_id = aspect_def_id.ok_or_else(|| {
                RepoError::InvalidData(format!("aspect map `{name}` has no stored definition"))
            })?;
            save_aspect_map(conn, ctx, catalog_id, name, map, aspect_def_id)?;
        }
    }
    Ok(())
}

fn save_aspect_map(
    conn: &Connection,
    ctx: &PersistenceContext,
    catalog_id: CatalogId,
    name: &str,
    map: &AspectMap,
    aspect_def_id: Uuid,
) -> RepoResult<()> {
    let catalog = uuid_text(catalog_id);
    let def_id = uuid_text(aspect_def_id);
    let previous = aspect_map_entities(conn, catalog_id, name)?;

    conn.execute(
        "DELETE FROM hierarchy_aspect_map_entry WHERE catalog_id = ?1 AND hierarchy_name = ?2;",
        params![catalog, name],
    )?;
    conn.execute(
        "DELETE FROM aspect WHERE catalog_id = ?1 AND hierarchy_name = ?2;",
        params![catalog, name],
    )?;

    let mut insert_entry = conn.prepare(
        "INSERT INTO hierarchy_aspect_map_entry (
            catalog_id, hierarchy_name, entity_id, aspect_def_id, entry_order
         )
         VALUES (?1, ?2, ?3, ?4, ?5);",
    )?;
    for (order, entity) in map.entities().enumerate() {
        ensure_entity(conn, entity)?;
        insert_entry.execute(params![catalog, name, uuid_text(entity.id()), def_id, order as i64])?;
    }

    let aspects: Vec<&dyn Aspect> = map.iter().collect();
    if let Some(mapping) = ctx.mappings().get(map.def().name()) {
        return write_mapped(conn, &mapping, catalog_id, &previous, &aspects);
    }

    let mut insert_aspect = conn.prepare(
        "INSERT INTO aspect (entity_id, aspect_def_id, catalog_id, hierarchy_name)
         VALUES (?1, ?2, ?3, ?4);",
    )?;
    let mut insert_value = conn.prepare(
        "INSERT INTO property_value (
            entity_id, aspect_def_id, catalog_id, property_name,
            value_index, value_text, value_binary
         )
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
    )?;
    for aspect in aspects {
        let entity = uuid_text(aspect.entity().id());
        insert_aspect.execute(params![entity, def_id, catalog, name])?;
        for row in encode_aspect(aspect)? {
            insert_value.execute(params![
                entity,
                def_id,
                catalog,
                row.property_name,
                row.value_index,
                row.value_text,
                row.value_binary,
            ])?;
        }
    }
    Ok(())
}

fn write_mapped(
    conn: &Connection,
    mapping: &TableMapping,
    catalog_id: CatalogId,
    previous: &[Entity],
    aspects: &[&dyn Aspect],
) -> RepoResult<()> {
    if mapping.pattern().is_keyed() {
        let current: HashSet<Entity> = aspects.iter().map(|aspect| aspect.entity()).collect();
        let stale: Vec<Entity> = previous
            .iter()
            .copied()
            .filter(|entity| !current.contains(entity))
            .collect();
        mapped_table::delete_entities(conn, mapping, catalog_id, &stale)?;
    } else {
        mapped_table::clear(conn, mapping, catalog_id)?;
    }
    mapped_table::write_aspects(conn, mapping, catalog_id, aspects)?;
    Ok(())
}

/// Removes the custom-table rows a hierarchy owned before it is dropped.
///
/// Tables with an entity column lose exactly the recorded entries; the
/// others are cleared by catalog, or entirely when unscoped.
pub(crate) fn clear_mapped_hierarchy(
    conn: &Connection,
    mapping: &TableMapping,
    catalog_id: CatalogId,
    name: &str,
) -> RepoResult<()> {
    if mapping.pattern().is_keyed() {
        let previous = aspect_map_entities(conn, catalog_id, name)?;
        mapped_table::delete_entities(conn, mapping, catalog_id, &previous)?;
    } else {
        mapped_table::clear(conn, mapping, catalog_id)?;
    }
    Ok(())
}

/// Rebuilds one hierarchy from its row and content tables.
pub(crate) fn load_hierarchy(
    conn: &Connection,
    ctx: &PersistenceContext,
    catalog_id: CatalogId,
    row: &HierarchyRow,
    defs_by_id: &HashMap<Uuid, Arc<AspectDef>>,
) -> RepoResult<Hierarchy> {
    let catalog = uuid_text(catalog_id);
    let name = row.name.as_str();
    let entity = |id: &str, column: &str| -> RepoResult<Entity> {
        let id = parse_uuid(id, column)?;
        Ok(ctx.entities().get_or_create(id).0)
    };

    let content = match row.hierarchy_type {
        HierarchyType::EntityList => {
            let mut stmt = conn.prepare(
                "SELECT entity_id FROM hierarchy_list_item
                 WHERE catalog_id = ?1 AND hierarchy_name = ?2
                 ORDER BY item_index ASC;",
            )?;
            let ids = stmt
                .query_map(params![catalog, name], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            let list = ids
                .iter()
                .map(|id| entity(id, "hierarchy_list_item.entity_id"))
                .collect::<RepoResult<EntityList>>()?;
            HierarchyContent::List(list)
        }
        HierarchyType::EntitySet => {
            let mut stmt = conn.prepare(
                "SELECT entity_id FROM hierarchy_set_item
                 WHERE catalog_id = ?1 AND hierarchy_name = ?2
                 ORDER BY sort_order ASC, rowid ASC;",
            )?;
            let ids = stmt
                .query_map(params![catalog, name], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            let mut set = if row.is_ordered {
                EntitySet::ordered()
            } else {
                EntitySet::new()
            };
            for id in &ids {
                set.insert(entity(id, "hierarchy_set_item.entity_id")?);
            }
            HierarchyContent::Set(set)
        }
        HierarchyType::EntityDirectory => {
            let mut stmt = conn.prepare(
                "SELECT entry_key, entity_id FROM hierarchy_directory_entry
                 WHERE catalog_id = ?1 AND hierarchy_name = ?2
                 ORDER BY entry_order ASC;",
            )?;
            let entries = stmt
                .query_map(params![catalog, name], |r| {
                    Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            let mut directory = EntityDirectory::new();
            for (key, id) in entries {
                directory.insert(key, entity(&id, "hierarchy_directory_entry.entity_id")?);
            }
            HierarchyContent::Directory(directory)
        }
        HierarchyType::EntityTree => {
            let mut stmt = conn.prepare(
                "SELECT node_path, entity_id FROM hierarchy_tree_node
                 WHERE catalog_id = ?1 AND hierarchy_name = ?2
                 ORDER BY node_id ASC;",
            )?;
            let nodes = stmt
                .query_map(params![catalog, name], |r| {
                    Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            let mut tree = EntityTree::new();
            for (path, id) in nodes {
                let value = id
                    .map(|id| entity(&id, "hierarchy_tree_node.entity_id"))
                    .transpose()?;
                tree.ensure(&path)
                    .map_err(|err| RepoError::InvalidData(format!("tree `{name}`: {err}")))?
                    .set_value(value);
            }
            HierarchyContent::Tree(tree)
        }
        HierarchyType::AspectMap => {
            let def = row
                .aspect_def_id
                .and_then(|id| defs_by_id.get(&id))
                .ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "aspect map `{name}` references an unlinked aspect def"
                    ))
                })?;
            HierarchyContent::AspectMap(load_aspect_map(conn, ctx, catalog_id, name, def)?)
        }
    };

    let hierarchy = Hierarchy::new(name, content)
        .map_err(|err| RepoError::InvalidData(format!("hierarchy `{name}`: {err}")))?;
    Ok(hierarchy.with_version(row.version))
}

fn load_aspect_map(
    conn: &Connection,
    ctx: &PersistenceContext,
    catalog_id: CatalogId,
    name: &str,
    def: &Arc<AspectDef>,
) -> RepoResult<AspectMap> {
    let entries: Vec<Entity> = aspect_map_entities(conn, catalog_id, name)?
        .into_iter()
        .map(|entity| ctx.entities().get_or_create(entity.id()).0)
        .collect();

    let values = match ctx.mappings().get(def.name()) {
        Some(mapping) => {
            mapping.check_compatible(def)?;
            read_mapped(conn, ctx, &mapping, catalog_id, &entries)?
        }
        None => read_eav(conn, catalog_id, def, &entries)?,
    };

    let mut map = AspectMap::new(Arc::clone(def));
    for (entity, properties) in values {
        let aspect = CheckedAspect::restore(entity, Arc::clone(def), properties).map_err(|err| {
            RepoError::InvalidData(format!("aspect `{}` of {entity}: {err}", def.name()))
        })?;
        map.insert(Box::new(aspect))?;
    }
    Ok(map)
}

type LoadedAspect = (Entity, Vec<(String, PropertyValue)>);

fn read_eav(
    conn: &Connection,
    catalog_id: CatalogId,
    def: &AspectDef,
    entries: &[Entity],
) -> RepoResult<Vec<LoadedAspect>> {
    let mut stmt = conn.prepare(
        "SELECT entity_id, property_name, value_index, value_text, value_binary
         FROM property_value
         WHERE catalog_id = ?1 AND aspect_def_id = ?2;",
    )?;
    let raw = stmt
        .query_map(
            params![uuid_text(catalog_id), uuid_text(def.global_id())],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    EavRow {
                        property_name: r.get(1)?,
                        value_index: r.get(2)?,
                        value_text: r.get(3)?,
                        value_binary: r.get(4)?,
                    },
                ))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let mut by_entity: HashMap<Entity, Vec<EavRow>> = HashMap::new();
    for (id, row) in raw {
        let entity = parse_entity(&id, "property_value.entity_id")?;
        by_entity.entry(entity).or_default().push(row);
    }

    entries
        .iter()
        .map(|entity| {
            let rows = by_entity.remove(entity).unwrap_or_default();
            Ok((*entity, decode_properties(def, rows)?))
        })
        .collect()
}

fn read_mapped(
    conn: &Connection,
    ctx: &PersistenceContext,
    mapping: &TableMapping,
    catalog_id: CatalogId,
    entries: &[Entity],
) -> RepoResult<Vec<LoadedAspect>> {
    let rows = mapped_table::read_rows(conn, mapping, catalog_id, ctx.page_size())?;

    if mapping.pattern().is_keyed() {
        let mut by_entity: HashMap<Entity, Vec<(String, PropertyValue)>> = HashMap::new();
        for row in rows {
            if let Some(entity) = row.entity {
                by_entity.insert(entity, row.values);
            }
        }
        return Ok(entries
            .iter()
            .map(|entity| (*entity, by_entity.remove(entity).unwrap_or_default()))
            .collect());
    }

    // No stored identity: rows bind to entries by position.
    let mut loaded = Vec::with_capacity(rows.len().max(entries.len()));
    let mut rows = rows.into_iter();
    for entity in entries {
        let values = rows.next().map(|row| row.values).unwrap_or_default();
        loaded.push((*entity, values));
    }
    for row in rows {
        loaded.push((ctx.entities().create(), row.values));
    }
    Ok(loaded)
}
