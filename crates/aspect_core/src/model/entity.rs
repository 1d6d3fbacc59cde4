//! Entity identity and the explicit entity registry.
//!
//! # Invariants
//! - An entity carries nothing but its UUID and never mutates.
//! - Entities are shared across catalogs by identifier value.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// Opaque identity. Meaning comes from the aspects attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Uuid);

impl Entity {
    /// Creates a fresh entity with a random v4 identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn id(self) -> Uuid {
        self.0
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of entities known to this process.
///
/// Passed by reference into the persistence engine; there is no global
/// instance.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    known: RwLock<HashSet<Entity>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints and records a new entity.
    pub fn create(&self) -> Entity {
        let entity = Entity::new();
        self.write().insert(entity);
        entity
    }

    /// Returns the entity for `id`, and whether it was already known.
    pub fn get_or_create(&self, id: Uuid) -> (Entity, bool) {
        let entity = Entity::from_uuid(id);
        let created = self.write().insert(entity);
        (entity, !created)
    }

    pub fn lookup(&self, id: Uuid) -> Option<Entity> {
        let entity = Entity::from_uuid(id);
        self.known
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&entity)
            .then_some(entity)
    }

    pub fn len(&self) -> usize {
        self.known
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashSet<Entity>> {
        self.known.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{Entity, EntityRegistry};
    use uuid::Uuid;

    #[test]
    fn create_then_lookup() {
        let registry = EntityRegistry::new();
        let entity = registry.create();
        assert_eq!(registry.lookup(entity.id()), Some(entity));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn get_or_create_reports_existing() {
        let registry = EntityRegistry::new();
        let id = Uuid::new_v4();
        let (first, existed) = registry.get_or_create(id);
        assert!(!existed);
        let (second, existed) = registry.get_or_create(id);
        assert!(existed);
        assert_eq!(first, second);
    }

    #[test]
    fn lookup_unknown_is_none() {
        let registry = EntityRegistry::new();
        assert!(registry.lookup(Uuid::new_v4()).is_none());
        assert!(Entity::new() != Entity::new());
    }
}
