//! Catalog repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist a catalog with its definitions, hierarchies and aspect data
//!   in one immediate transaction.
//! - Rebuild catalogs through the registries of the shared context.
//! - Own custom-table registration and creation.
//!
//! # Invariants
//! - A save that fails anywhere rolls back before the error is returned.
//! - Saving replaces the persisted content of the catalog: hierarchies no
//!   longer present are removed together with their data.
//! - Catalog rows are upserted, never replaced, so dependent rows are not
//!   cascaded away mid-save.
//! - Logs carry ids and counts only, never property values.

use crate::db::migrations::latest_version;
use crate::db::Dialect;
use crate::model::aspect_def::AspectDef;
use crate::model::catalog::{Catalog, CatalogId, Species};
use crate::model::error::ValidationError;
use crate::model::hierarchy::{HierarchyContent, HierarchyType};
use crate::repo::aspect_def_repo::{link_aspect_defs, load_linked_aspect_defs, upsert_aspect_def};
use crate::repo::codec::{parse_uuid, uuid_text};
use crate::repo::context::PersistenceContext;
use crate::repo::hierarchy_repo::{
    clear_mapped_hierarchy, delete_hierarchy, load_hierarchy, load_hierarchy_rows, save_content,
    upsert_hierarchy,
};
use crate::repo::mapped_table;
use crate::repo::mapping::TableMapping;
use crate::repo::{RepoError, RepoResult};
use log::{error, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Repository interface for whole-catalog persistence.
pub trait CatalogRepository {
    /// Saves the catalog and everything it contains, atomically.
    fn save_catalog(&self, catalog: &Catalog) -> RepoResult<()>;
    /// Loads one catalog; `Ok(None)` when the id is unknown.
    fn load_catalog(&self, catalog_id: CatalogId) -> RepoResult<Option<Catalog>>;
    /// Deletes one catalog and all data it owns.
    fn delete_catalog(&self, catalog_id: CatalogId) -> RepoResult<()>;
    fn catalog_exists(&self, catalog_id: CatalogId) -> RepoResult<bool>;
    /// Ids of every persisted catalog in insertion order.
    fn list_catalog_ids(&self) -> RepoResult<Vec<CatalogId>>;
    /// Creates the custom table of `mapping` if it does not exist.
    fn create_table(&self, mapping: &TableMapping) -> RepoResult<()>;
    /// Routes the mapping's definition to its custom table from now on.
    fn register_mapping(&self, mapping: TableMapping) -> RepoResult<Arc<TableMapping>>;
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
    ctx: &'conn PersistenceContext,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Constructs a repository over a migrated connection.
    ///
    /// Fails when the context targets another dialect or the schema
    /// version does not match this build.
    pub fn try_new(conn: &'conn Connection, ctx: &'conn PersistenceContext) -> RepoResult<Self> {
        if ctx.dialect() != Dialect::Sqlite {
            return Err(RepoError::UnsupportedDialect(ctx.dialect()));
        }
        ensure_catalog_connection_ready(conn)?;
        Ok(Self { conn, ctx })
    }

    pub fn context(&self) -> &PersistenceContext {
        self.ctx
    }

    fn save_in_tx(&self, tx: &Transaction<'_>, catalog: &Catalog) -> RepoResult<()> {
        let catalog_id = catalog.id();
        let defs = collect_aspect_defs(catalog)?;
        for def in &defs {
            if let Some(mapping) = self.ctx.mappings().get(def.name()) {
                mapping.check_compatible(def)?;
            }
        }

        tx.execute(
            "INSERT INTO catalog (catalog_id, species, uri, upstream_catalog_id, version_number)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (catalog_id) DO UPDATE SET
                species = excluded.species,
                uri = excluded.uri,
                upstream_catalog_id = excluded.upstream_catalog_id,
                version_number = excluded.version_number;",
            params![
                uuid_text(catalog_id),
                catalog.species().as_str(),
                catalog.uri(),
                catalog.upstream().map(uuid_text),
                catalog.version(),
            ],
        )?;

        let mut def_ids: HashMap<&str, Uuid> = HashMap::with_capacity(defs.len());
        let mut ordered_ids = Vec::with_capacity(defs.len());
        for def in &defs {
            let stored_id = upsert_aspect_def(tx, def)?;
            def_ids.insert(def.name(), stored_id);
            ordered_ids.push(stored_id);
        }
        link_aspect_defs(tx, catalog_id, &ordered_ids)?;

        let map_def_id = |content: &HierarchyContent| match content {
            HierarchyContent::AspectMap(map) => def_ids.get(map.def().name()).copied(),
            _ => None,
        };

        for previous in load_hierarchy_rows(tx, catalog_id)? {
            let kept = catalog.hierarchy(&previous.name).is_some_and(|current| {
                current.hierarchy_type() == previous.hierarchy_type
                    && map_def_id(current.content()) == previous.aspect_def_id
            });
            if kept {
                continue;
            }
            if let Some(def_id) = previous.aspect_def_id {
                if let Some(mapping) = self.mapping_for_def_id(tx, def_id)? {
                    clear_mapped_hierarchy(tx, &mapping, catalog_id, &previous.name)?;
                }
            }
            delete_hierarchy(tx, catalog_id, &previous.name)?;
        }

        for hierarchy in catalog.hierarchies() {
            let aspect_def_id = map_def_id(hierarchy.content());
            upsert_hierarchy(tx, catalog_id, hierarchy, aspect_def_id)?;
            save_content(tx, self.ctx, catalog_id, hierarchy, aspect_def_id)?;
        }
        Ok(())
    }

    fn mapping_for_def_id(
        &self,
        conn: &Connection,
        aspect_def_id: Uuid,
    ) -> RepoResult<Option<Arc<TableMapping>>> {
        let name: Option<String> = conn
            .query_row(
                "SELECT name FROM aspect_def WHERE aspect_def_id = ?1;",
                [uuid_text(aspect_def_id)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name.and_then(|name| self.ctx.mappings().get(&name)))
    }

    fn load_with(&self, catalog_id: CatalogId) -> RepoResult<Option<Catalog>> {
        let row: Option<(String, Option<String>, Option<String>, i64)> = self
            .conn
            .query_row(
                "SELECT species, uri, upstream_catalog_id, version_number
                 FROM catalog
                 WHERE catalog_id = ?1;",
                [uuid_text(catalog_id)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let Some((species, uri, upstream, version)) = row else {
            return Ok(None);
        };

        let species = Species::parse(&species)
            .ok_or_else(|| RepoError::InvalidData(format!("unknown species `{species}`")))?;
        let upstream = upstream
            .map(|id| parse_uuid(&id, "catalog.upstream_catalog_id"))
            .transpose()?;
        let mut catalog = Catalog::with_id(catalog_id, species, upstream)
            .map_err(|err| RepoError::InvalidData(format!("catalog {catalog_id}: {err}")))?;
        catalog.set_uri(uri);
        catalog.set_version(version);

        let mut defs_by_id = HashMap::new();
        for def in load_linked_aspect_defs(self.conn, catalog_id)? {
            let shared = self.ctx.aspect_defs().register(def);
            defs_by_id.insert(shared.global_id(), Arc::clone(&shared));
            catalog
                .add_aspect_def(shared)
                .map_err(|err| RepoError::InvalidData(format!("catalog {catalog_id}: {err}")))?;
        }

        for row in load_hierarchy_rows(self.conn, catalog_id)? {
            let hierarchy = load_hierarchy(self.conn, self.ctx, catalog_id, &row, &defs_by_id)?;
            catalog
                .add_hierarchy(hierarchy)
                .map_err(|err| RepoError::InvalidData(format!("catalog {catalog_id}: {err}")))?;
        }
        Ok(Some(catalog))
    }

    fn delete_in_tx(&self, tx: &Transaction<'_>, catalog_id: CatalogId) -> RepoResult<usize> {
        let mut cleared = 0;
        for row in load_hierarchy_rows(tx, catalog_id)? {
            if row.hierarchy_type != HierarchyType::AspectMap {
                continue;
            }
            let Some(def_id) = row.aspect_def_id else {
                continue;
            };
            if let Some(mapping) = self.mapping_for_def_id(tx, def_id)? {
                mapped_table::clear(tx, &mapping, catalog_id)?;
                cleared += 1;
            }
        }
        let removed = tx.execute(
            "DELETE FROM catalog WHERE catalog_id = ?1;",
            [uuid_text(catalog_id)],
        )?;
        if removed == 0 {
            return Err(RepoError::NotFound(catalog_id));
        }
        Ok(cleared)
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn save_catalog(&self, catalog: &Catalog) -> RepoResult<()> {
        let started_at = Instant::now();
        info!(
            "event=catalog_save module=repo status=start catalog_id={} species={} hierarchies={}",
            catalog.id(),
            catalog.species(),
            catalog.hierarchies().len()
        );

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Err(err) = self.save_in_tx(&tx, catalog) {
            rollback(tx, "catalog_save", catalog.id());
            error!(
                "event=catalog_save module=repo status=error catalog_id={} duration_ms={} error={}",
                catalog.id(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }
        tx.commit()?;

        info!(
            "event=catalog_save module=repo status=ok catalog_id={} version={} duration_ms={}",
            catalog.id(),
            catalog.version(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn load_catalog(&self, catalog_id: CatalogId) -> RepoResult<Option<Catalog>> {
        let started_at = Instant::now();
        match self.load_with(catalog_id) {
            Ok(Some(catalog)) => {
                info!(
                    "event=catalog_load module=repo status=ok catalog_id={} hierarchies={} duration_ms={}",
                    catalog_id,
                    catalog.hierarchies().len(),
                    started_at.elapsed().as_millis()
                );
                Ok(Some(catalog))
            }
            Ok(None) => {
                info!(
                    "event=catalog_load module=repo status=miss catalog_id={} duration_ms={}",
                    catalog_id,
                    started_at.elapsed().as_millis()
                );
                Ok(None)
            }
            Err(err) => {
                error!(
                    "event=catalog_load module=repo status=error catalog_id={} duration_ms={} error={}",
                    catalog_id,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn delete_catalog(&self, catalog_id: CatalogId) -> RepoResult<()> {
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        match self.delete_in_tx(&tx, catalog_id) {
            Ok(cleared) => {
                tx.commit()?;
                info!(
                    "event=catalog_delete module=repo status=ok catalog_id={} mapped_tables={} duration_ms={}",
                    catalog_id,
                    cleared,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                rollback(tx, "catalog_delete", catalog_id);
                error!(
                    "event=catalog_delete module=repo status=error catalog_id={} error={}",
                    catalog_id, err
                );
                Err(err)
            }
        }
    }

    fn catalog_exists(&self, catalog_id: CatalogId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM catalog WHERE catalog_id = ?1);",
            [uuid_text(catalog_id)],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_catalog_ids(&self) -> RepoResult<Vec<CatalogId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT catalog_id FROM catalog ORDER BY rowid ASC;")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids.iter()
            .map(|id| parse_uuid(id, "catalog.catalog_id"))
            .collect()
    }

    fn create_table(&self, mapping: &TableMapping) -> RepoResult<()> {
        mapped_table::create_table(self.conn, mapping).map_err(|err| {
            error!(
                "event=table_create module=repo status=error table={} error={}",
                mapping.table(),
                err
            );
            err
        })
    }

    fn register_mapping(&self, mapping: TableMapping) -> RepoResult<Arc<TableMapping>> {
        let registered = self.ctx.mappings().register(mapping);
        info!(
            "event=mapping_register module=repo status=ok aspect_def={} table={} pattern={:?}",
            registered.aspect_def().name(),
            registered.table(),
            registered.pattern()
        );
        Ok(registered)
    }
}

/// Catalog definitions plus those of its aspect maps, deduplicated by name.
fn collect_aspect_defs(catalog: &Catalog) -> RepoResult<Vec<Arc<AspectDef>>> {
    let map_defs = catalog.hierarchies().iter().filter_map(|h| match h.content() {
        HierarchyContent::AspectMap(map) => Some(map.def()),
        _ => None,
    });

    let mut defs: Vec<Arc<AspectDef>> = Vec::new();
    for def in catalog.aspect_defs().iter().chain(map_defs) {
        match defs.iter().find(|known| known.name() == def.name()) {
            Some(known) if **known == **def => {}
            Some(_) => {
                return Err(ValidationError::ConflictingAspectDef {
                    name: def.name().to_string(),
                }
                .into())
            }
            None => defs.push(Arc::clone(def)),
        }
    }
    Ok(defs)
}

fn rollback(tx: Transaction<'_>, operation: &str, catalog_id: CatalogId) {
    match tx.rollback() {
        Ok(()) => warn!(
            "event=catalog_rollback module=repo status=ok operation={} catalog_id={}",
            operation, catalog_id
        ),
        Err(err) => error!(
            "event=catalog_rollback module=repo status=error operation={} catalog_id={} error={}",
            operation, catalog_id, err
        ),
    }
}

fn ensure_catalog_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
