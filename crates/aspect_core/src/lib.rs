//! Schema-flexible entity/aspect model with a relational persistence engine.
//! Catalogs of typed aspects are saved and loaded transactionally, with
//! aspect data stored as EAV rows or in registered custom tables.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, DatabaseConfig, EngineConfig, LoggingConfig};
pub use db::{open_db, open_db_in_memory, open_from_config, DbError, DbResult, Dialect};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::{
    Aspect, AspectDef, Catalog, CatalogId, Entity, Hierarchy, HierarchyContent, ModelError,
    PropertyDef, PropertyType, PropertyValue, Species, ValidationError, Value,
};
pub use repo::{
    AddressPattern, CatalogRepository, PersistenceContext, RepoError, RepoResult,
    SqliteCatalogRepository, TableMapping,
};
pub use service::CatalogService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
