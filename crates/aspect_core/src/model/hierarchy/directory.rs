use crate::model::entity::Entity;

/// String-keyed entities in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityDirectory {
    entries: Vec<(String, Entity)>,
}

impl EntityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `key` to `entity`. Rebinding an existing key keeps its position
    /// and returns the previous entity.
    pub fn insert(&mut self, key: impl Into<String>, entity: Entity) -> Option<Entity> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, entity)),
            None => {
                self.entries.push((key, entity));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Entity> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, entity)| *entity)
    }

    pub fn remove(&mut self, key: &str) -> Option<Entity> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Entity)> {
        self.entries.iter().map(|(key, entity)| (key.as_str(), *entity))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
