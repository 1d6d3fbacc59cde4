use crate::model::entity::Entity;
use crate::model::error::ValidationError;

/// Ordered entity sequence; duplicates allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityList {
    items: Vec<Entity>,
}

impl EntityList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity: Entity) {
        self.items.push(entity);
    }

    pub fn insert(&mut self, index: usize, entity: Entity) -> Result<(), ValidationError> {
        if index > self.items.len() {
            return Err(ValidationError::IndexOutOfBounds {
                index,
                len: self.items.len(),
            });
        }
        self.items.insert(index, entity);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Entity, ValidationError> {
        if index >= self.items.len() {
            return Err(ValidationError::IndexOutOfBounds {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    pub fn get(&self, index: usize) -> Option<Entity> {
        self.items.get(index).copied()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<Entity> for EntityList {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
