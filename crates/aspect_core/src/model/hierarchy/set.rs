use crate::model::entity::Entity;
use crate::model::error::ValidationError;
use std::collections::HashSet;

/// Entity set without duplicates.
///
/// Iteration follows insertion order. When `is_ordered` is set the order is
/// significant: it is persisted and compared; otherwise only membership is.
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    order: Vec<Entity>,
    members: HashSet<Entity>,
    ordered: bool,
}

impl EntitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordered() -> Self {
        Self {
            ordered: true,
            ..Self::default()
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Returns `false` when `entity` is already a member.
    pub fn insert(&mut self, entity: Entity) -> bool {
        if !self.members.insert(entity) {
            return false;
        }
        self.order.push(entity);
        true
    }

    pub fn remove(&mut self, entity: Entity) -> bool {
        if !self.members.remove(&entity) {
            return false;
        }
        self.order.retain(|member| *member != entity);
        true
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.members.contains(&entity)
    }

    /// Moves a member to `index` in the explicit order.
    pub fn move_to(&mut self, entity: Entity, index: usize) -> Result<(), ValidationError> {
        let len = self.order.len();
        let current = self
            .order
            .iter()
            .position(|member| *member == entity)
            .ok_or(ValidationError::IndexOutOfBounds { index, len })?;
        if index >= len {
            return Err(ValidationError::IndexOutOfBounds { index, len });
        }
        let moved = self.order.remove(current);
        self.order.insert(index, moved);
        Ok(())
    }

    pub fn entities(&self) -> &[Entity] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl PartialEq for EntitySet {
    fn eq(&self, other: &Self) -> bool {
        if self.ordered != other.ordered {
            return false;
        }
        if self.ordered {
            self.order == other.order
        } else {
            self.members == other.members
        }
    }
}
