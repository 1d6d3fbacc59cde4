//! Aspect schema descriptors with structural identity.
//!
//! # Responsibility
//! - Hold the ordered property list and the four capability flags of an
//!   aspect schema.
//! - Derive a content-based hash so independently built definitions are
//!   recognised as the same schema.
//!
//! # Invariants
//! - Property order is insertion order and is part of the hash.
//! - The hash ignores `global_id`.
//! - Adding or removing a property invalidates the cached hash; the next
//!   `hash()` call recomputes it.
//!
//! # See also
//! - `model::registry` for sharing definitions across catalogs.

use crate::model::error::ValidationError;
use crate::model::hash::StructuralHasher;
use crate::model::property_def::{validate_name, PropertyDef};
use once_cell::sync::OnceCell;
use uuid::Uuid;

/// The four capability flags of an aspect definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectCapabilities {
    pub readable: bool,
    pub writable: bool,
    pub can_add_properties: bool,
    pub can_remove_properties: bool,
}

impl AspectCapabilities {
    pub const MUTABLE: Self = Self {
        readable: true,
        writable: true,
        can_add_properties: true,
        can_remove_properties: true,
    };

    pub const IMMUTABLE: Self = Self {
        readable: true,
        writable: false,
        can_add_properties: false,
        can_remove_properties: false,
    };

    pub fn profile(self) -> AspectDefProfile {
        if self == Self::MUTABLE {
            AspectDefProfile::Mutable
        } else if self == Self::IMMUTABLE {
            AspectDefProfile::Immutable
        } else {
            AspectDefProfile::Mixed
        }
    }
}

/// Recurring capability profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectDefProfile {
    Mutable,
    Immutable,
    Mixed,
}

/// Structural schema of an aspect.
#[derive(Debug, Clone)]
pub struct AspectDef {
    name: String,
    global_id: Uuid,
    properties: Vec<PropertyDef>,
    capabilities: AspectCapabilities,
    hash: OnceCell<u64>,
}

impl AspectDef {
    /// Definition that allows adding and removing properties.
    pub fn mutable(
        name: impl Into<String>,
        properties: Vec<PropertyDef>,
    ) -> Result<Self, ValidationError> {
        Self::new(name, Uuid::new_v4(), properties, AspectCapabilities::MUTABLE)
    }

    /// Read-only definition with a fixed property list.
    pub fn immutable(
        name: impl Into<String>,
        properties: Vec<PropertyDef>,
    ) -> Result<Self, ValidationError> {
        Self::new(name, Uuid::new_v4(), properties, AspectCapabilities::IMMUTABLE)
    }

    pub fn mixed(
        name: impl Into<String>,
        properties: Vec<PropertyDef>,
        capabilities: AspectCapabilities,
    ) -> Result<Self, ValidationError> {
        Self::new(name, Uuid::new_v4(), properties, capabilities)
    }

    /// Full constructor, used when restoring a persisted definition.
    pub fn new(
        name: impl Into<String>,
        global_id: Uuid,
        properties: Vec<PropertyDef>,
        capabilities: AspectCapabilities,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_name("aspect def", &name)?;
        for (index, property) in properties.iter().enumerate() {
            if properties[..index].iter().any(|p| p.same_name(property)) {
                return Err(ValidationError::DuplicateProperty {
                    aspect_def: name,
                    property: property.name().to_string(),
                });
            }
        }
        Ok(Self {
            name,
            global_id,
            properties,
            capabilities,
            hash: OnceCell::new(),
        })
    }

    pub fn with_global_id(mut self, global_id: Uuid) -> Self {
        self.global_id = global_id;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn global_id(&self) -> Uuid {
        self.global_id
    }

    pub fn capabilities(&self) -> AspectCapabilities {
        self.capabilities
    }

    pub fn profile(&self) -> AspectDefProfile {
        self.capabilities.profile()
    }

    pub fn is_readable(&self) -> bool {
        self.capabilities.readable
    }

    pub fn is_writable(&self) -> bool {
        self.capabilities.writable
    }

    pub fn can_add_properties(&self) -> bool {
        self.capabilities.can_add_properties
    }

    pub fn can_remove_properties(&self) -> bool {
        self.capabilities.can_remove_properties
    }

    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name() == name)
    }

    /// Like [`AspectDef::property`], failing with `UnknownProperty`.
    pub fn require_property(&self, name: &str) -> Result<&PropertyDef, ValidationError> {
        self.property(name)
            .ok_or_else(|| ValidationError::UnknownProperty {
                aspect_def: self.name.clone(),
                property: name.to_string(),
            })
    }

    pub fn add_property(&mut self, property: PropertyDef) -> Result<(), ValidationError> {
        if !self.capabilities.can_add_properties {
            return Err(ValidationError::AddPropertyForbidden {
                aspect_def: self.name.clone(),
            });
        }
        if self.property(property.name()).is_some() {
            return Err(ValidationError::DuplicateProperty {
                aspect_def: self.name.clone(),
                property: property.name().to_string(),
            });
        }
        self.properties.push(property);
        self.hash.take();
        Ok(())
    }

    pub fn remove_property(&mut self, name: &str) -> Result<PropertyDef, ValidationError> {
        if !self.capabilities.can_remove_properties {
            return Err(ValidationError::RemovePropertyForbidden {
                aspect_def: self.name.clone(),
            });
        }
        let index = self
            .property_index(name)
            .ok_or_else(|| ValidationError::UnknownProperty {
                aspect_def: self.name.clone(),
                property: name.to_string(),
            })?;
        if !self.properties[index].is_removable() {
            return Err(ValidationError::NotRemovable {
                aspect_def: self.name.clone(),
                property: name.to_string(),
            });
        }
        let removed = self.properties.remove(index);
        self.hash.take();
        Ok(removed)
    }

    /// Structural hash over name, ordered properties and capabilities.
    pub fn hash(&self) -> u64 {
        *self.hash.get_or_init(|| {
            let mut hasher = StructuralHasher::new("aspect_def");
            hasher.write_str(&self.name);
            hasher.write_u64(self.properties.len() as u64);
            for property in &self.properties {
                hasher.write_u64(property.hash());
            }
            hasher.write_bool(self.capabilities.readable);
            hasher.write_bool(self.capabilities.writable);
            hasher.write_bool(self.capabilities.can_add_properties);
            hasher.write_bool(self.capabilities.can_remove_properties);
            hasher.finish()
        })
    }

    pub fn same_name(&self, other: &AspectDef) -> bool {
        self.name == other.name
    }
}

/// Structural equality; `global_id` is not compared.
impl PartialEq for AspectDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.capabilities == other.capabilities
            && self.properties == other.properties
    }
}
