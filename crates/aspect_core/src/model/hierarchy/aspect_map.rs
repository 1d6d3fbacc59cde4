use crate::model::aspect::{Aspect, CheckedAspect};
use crate::model::aspect_def::AspectDef;
use crate::model::entity::Entity;
use crate::model::error::ValidationError;
use std::collections::HashMap;
use std::sync::Arc;

/// Entity to aspect map over one fixed definition, in insertion order.
#[derive(Debug, Clone)]
pub struct AspectMap {
    def: Arc<AspectDef>,
    entries: Vec<Box<dyn Aspect>>,
    positions: HashMap<Entity, usize>,
}

impl AspectMap {
    pub fn new(def: Arc<AspectDef>) -> Self {
        Self {
            def,
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn def(&self) -> &Arc<AspectDef> {
        &self.def
    }

    /// Stores `aspect` under its entity. Replacing keeps the entry's position
    /// and returns the previous aspect.
    pub fn insert(
        &mut self,
        aspect: Box<dyn Aspect>,
    ) -> Result<Option<Box<dyn Aspect>>, ValidationError> {
        let aspect_def = aspect.def();
        if !Arc::ptr_eq(aspect_def, &self.def) && **aspect_def != *self.def {
            return Err(ValidationError::AspectDefMismatch {
                expected: self.def.name().to_string(),
                actual: aspect_def.name().to_string(),
            });
        }
        let entity = aspect.entity();
        match self.positions.get(&entity) {
            Some(&index) => Ok(Some(std::mem::replace(&mut self.entries[index], aspect))),
            None => {
                self.positions.insert(entity, self.entries.len());
                self.entries.push(aspect);
                Ok(None)
            }
        }
    }

    /// Returns the aspect for `entity`, creating a checked one when absent.
    pub fn get_or_insert(&mut self, entity: Entity) -> &mut dyn Aspect {
        let index = match self.positions.get(&entity) {
            Some(&index) => index,
            None => {
                let aspect = CheckedAspect::new(entity, Arc::clone(&self.def));
                self.positions.insert(entity, self.entries.len());
                self.entries.push(Box::new(aspect));
                self.entries.len() - 1
            }
        };
        self.entries[index].as_mut()
    }

    pub fn get(&self, entity: Entity) -> Option<&dyn Aspect> {
        let index = *self.positions.get(&entity)?;
        Some(self.entries[index].as_ref())
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut dyn Aspect> {
        let index = *self.positions.get(&entity)?;
        Some(self.entries[index].as_mut())
    }

    pub fn remove(&mut self, entity: Entity) -> Option<Box<dyn Aspect>> {
        let index = self.positions.remove(&entity)?;
        let removed = self.entries.remove(index);
        for position in self.positions.values_mut() {
            if *position > index {
                *position -= 1;
            }
        }
        Some(removed)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.positions.contains_key(&entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entries.iter().map(|aspect| aspect.entity())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Aspect> {
        self.entries.iter().map(|aspect| aspect.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Same definition structure, same entities in the same order, same values.
impl PartialEq for AspectMap {
    fn eq(&self, other: &Self) -> bool {
        *self.def == *other.def
            && self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|(left, right)| {
                    left.entity() == right.entity() && left.snapshot() == right.snapshot()
                })
    }
}
