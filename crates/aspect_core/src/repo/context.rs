use crate::config::{EngineConfig, DEFAULT_PAGE_SIZE};
use crate::db::Dialect;
use crate::model::entity::EntityRegistry;
use crate::model::registry::AspectDefRegistry;
use crate::repo::mapping::MappingRegistry;

/// Shared state of the persistence engine, passed by reference into every
/// repository.
#[derive(Debug)]
pub struct PersistenceContext {
    dialect: Dialect,
    page_size: u32,
    entities: EntityRegistry,
    aspect_defs: AspectDefRegistry,
    mappings: MappingRegistry,
}

impl PersistenceContext {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            page_size: DEFAULT_PAGE_SIZE,
            entities: EntityRegistry::new(),
            aspect_defs: AspectDefRegistry::new(),
            mappings: MappingRegistry::new(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.dialect()).with_page_size(config.page_size())
    }

    /// Rows fetched per round trip when reading custom tables. Zero is
    /// treated as one.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    pub fn aspect_defs(&self) -> &AspectDefRegistry {
        &self.aspect_defs
    }

    pub fn mappings(&self) -> &MappingRegistry {
        &self.mappings
    }
}

impl Default for PersistenceContext {
    fn default() -> Self {
        Self::new(Dialect::Sqlite)
    }
}
