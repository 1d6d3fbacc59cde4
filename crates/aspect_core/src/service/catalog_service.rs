//! Catalog use-case service.
//!
//! # Responsibility
//! - Provide stable catalog entry points for callers above the engine.
//! - Delegate persistence to a `CatalogRepository` implementation.
//!
//! # Invariants
//! - Service APIs never bypass repository validation or transactions.
//! - A failed revision commit leaves the in-memory version unchanged.

use crate::model::catalog::{Catalog, CatalogId};
use crate::repo::catalog_repo::CatalogRepository;
use crate::repo::mapping::TableMapping;
use crate::repo::{RepoError, RepoResult};
use std::sync::Arc;

/// Use-case service wrapper for catalog persistence.
pub struct CatalogService<R: CatalogRepository> {
    repo: R,
}

impl<R: CatalogRepository> CatalogService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn save(&self, catalog: &Catalog) -> RepoResult<()> {
        self.repo.save_catalog(catalog)
    }

    pub fn load(&self, catalog_id: CatalogId) -> RepoResult<Option<Catalog>> {
        self.repo.load_catalog(catalog_id)
    }

    /// Loads a catalog that must exist.
    pub fn load_required(&self, catalog_id: CatalogId) -> RepoResult<Catalog> {
        self.repo
            .load_catalog(catalog_id)?
            .ok_or(RepoError::NotFound(catalog_id))
    }

    pub fn delete(&self, catalog_id: CatalogId) -> RepoResult<()> {
        self.repo.delete_catalog(catalog_id)
    }

    pub fn exists(&self, catalog_id: CatalogId) -> RepoResult<bool> {
        self.repo.catalog_exists(catalog_id)
    }

    pub fn list(&self) -> RepoResult<Vec<CatalogId>> {
        self.repo.list_catalog_ids()
    }

    /// Bumps the catalog version and saves it.
    ///
    /// # Contract
    /// - Returns the new version on success.
    /// - On failure the previous version is restored on `catalog`.
    pub fn commit_revision(&self, catalog: &mut Catalog) -> RepoResult<i64> {
        let previous = catalog.version();
        let next = catalog.bump_version();
        if let Err(err) = self.repo.save_catalog(catalog) {
            catalog.set_version(previous);
            return Err(err);
        }
        Ok(next)
    }

    /// Registers `mapping`, creating its table first when asked to.
    pub fn install_mapping(
        &self,
        mapping: TableMapping,
        create_table: bool,
    ) -> RepoResult<Arc<TableMapping>> {
        if create_table {
            self.repo.create_table(&mapping)?;
        }
        self.repo.register_mapping(mapping)
    }
}
