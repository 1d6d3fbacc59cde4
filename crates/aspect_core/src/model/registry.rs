//! Explicit registry of shared aspect definitions.
//!
//! # Responsibility
//! - Let independently built definitions collapse onto one shared
//!   instance when they are structurally identical.
//!
//! # Invariants
//! - At most one definition per name.
//! - `resolve` never replaces an existing definition; `register` does.

use crate::model::aspect_def::AspectDef;
use crate::model::error::ValidationError;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct AspectDefRegistry {
    by_name: RwLock<HashMap<String, Arc<AspectDef>>>,
}

impl AspectDefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared instance for `def`.
    ///
    /// An existing entry with the same name is reused when its structure
    /// matches; a structurally different one is a `ConflictingAspectDef`.
    pub fn resolve(&self, def: AspectDef) -> Result<Arc<AspectDef>, ValidationError> {
        let mut by_name = self.by_name.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = by_name.get(def.name()) {
            if existing.hash() == def.hash() && **existing == def {
                return Ok(Arc::clone(existing));
            }
            return Err(ValidationError::ConflictingAspectDef {
                name: def.name().to_string(),
            });
        }
        let shared = Arc::new(def);
        by_name.insert(shared.name().to_string(), Arc::clone(&shared));
        Ok(shared)
    }

    /// Stores `def`, replacing any previous entry of the same name unless it
    /// is structurally identical (then the previous instance is kept).
    pub fn register(&self, def: AspectDef) -> Arc<AspectDef> {
        let mut by_name = self.by_name.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = by_name.get(def.name()) {
            if existing.global_id() == def.global_id() && **existing == def {
                return Arc::clone(existing);
            }
        }
        let shared = Arc::new(def);
        by_name.insert(shared.name().to_string(), Arc::clone(&shared));
        shared
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<AspectDef>> {
        self.by_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn lookup_by_id(&self, global_id: Uuid) -> Option<Arc<AspectDef>> {
        self.by_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|def| def.global_id() == global_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.by_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::AspectDefRegistry;
    use crate::model::aspect_def::AspectDef;
    use crate::model::error::ValidationError;
    use crate::model::property_def::PropertyDef;
    use crate::model::value::PropertyType;
    use std::sync::Arc;

    fn person(extra: bool) -> AspectDef {
        let mut props = vec![PropertyDef::builder("name", PropertyType::String)
            .build()
            .unwrap()];
        if extra {
            props.push(
                PropertyDef::builder("age", PropertyType::Integer)
                    .build()
                    .unwrap(),
            );
        }
        AspectDef::mutable("person", props).unwrap()
    }

    #[test]
    fn resolve_shares_identical_structure() {
        let registry = AspectDefRegistry::new();
        let first = registry.resolve(person(false)).unwrap();
        let second = registry.resolve(person(false)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup_by_id(first.global_id()).is_some());
    }

    #[test]
    fn resolve_rejects_conflicting_structure() {
        let registry = AspectDefRegistry::new();
        registry.resolve(person(false)).unwrap();
        let err = registry.resolve(person(true)).unwrap_err();
        assert!(matches!(err, ValidationError::ConflictingAspectDef { .. }));
    }

    #[test]
    fn register_replaces() {
        let registry = AspectDefRegistry::new();
        registry.register(person(false));
        let replaced = registry.register(person(true));
        assert_eq!(registry.lookup("person").unwrap().properties().len(), 2);
        assert!(Arc::ptr_eq(&replaced, &registry.lookup("person").unwrap()));
    }
}
