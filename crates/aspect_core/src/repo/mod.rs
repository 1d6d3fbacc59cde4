//! Persistence engine: catalog graphs on relational storage.
//!
//! # Responsibility
//! - Save, load and delete whole catalogs transactionally.
//! - Store aspect data either as EAV rows or in registered custom tables.
//!
//! # Invariants
//! - A failed save rolls back explicitly; no partial catalog is visible.
//! - Persisted state that cannot be decoded is reported as `InvalidData`,
//!   never masked.
//! - Validation failures and storage failures stay distinguishable.
//!
//! # See also
//! - `db::migrations` for the logical schema.

use crate::db::{DbError, Dialect};
use crate::model::catalog::CatalogId;
use crate::model::error::{LifecycleError, ModelError, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod aspect_def_repo;
pub mod catalog_repo;
mod codec;
mod context;
pub mod eav;
mod hierarchy_repo;
pub mod mapped_table;
pub mod mapping;

pub use catalog_repo::{CatalogRepository, SqliteCatalogRepository};
pub use context::PersistenceContext;
pub use eav::EavRow;
pub use mapping::{AddressPattern, MappingRegistry, TableMapping, TableMappingBuilder};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Model(ModelError),
    Db(DbError),
    NotFound(CatalogId),
    InvalidData(String),
    UnsupportedDialect(Dialect),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl RepoError {
    /// The store could not do its job; the caller's data may be fine.
    pub fn is_persistence(&self) -> bool {
        !self.is_validation()
    }

    /// The caller's data broke a model rule.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Model(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "catalog not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UnsupportedDialect(dialect) => {
                write!(f, "dialect `{}` cannot execute statements", dialect.name())
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match {expected_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelError> for RepoError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Model(ModelError::Validation(value))
    }
}

impl From<LifecycleError> for RepoError {
    fn from(value: LifecycleError) -> Self {
        Self::Model(ModelError::Lifecycle(value))
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
