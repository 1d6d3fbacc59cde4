//! Aspect contract and its map-backed representations.
//!
//! # Responsibility
//! - Define the uniform read/write contract the persistence engine uses.
//! - Provide a plain map aspect and a fully definition-checked map aspect.
//!
//! # Invariants
//! - Every stored key is a property of the aspect's definition.
//! - Stored values already match the property's type and shape.
//! - Writes honour the writable and removable flags on every representation;
//!   only restoring persisted data bypasses them.
//! - A non-transferable aspect stays bound to the entity it was created for.
//!
//! # See also
//! - `model::record` for aspects backed by a native struct.

use crate::model::aspect_def::AspectDef;
use crate::model::entity::Entity;
use crate::model::error::{LifecycleError, ValidationError};
use crate::model::property_def::PropertyDef;
use crate::model::value::{PropertyValue, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Property bag bound to one entity under one definition.
pub trait Aspect: Send + Sync + Debug {
    fn entity(&self) -> Entity;

    fn def(&self) -> &Arc<AspectDef>;

    fn is_transferable(&self) -> bool;

    /// Rebinds this aspect to `entity`.
    fn attach(&mut self, entity: Entity) -> Result<(), LifecycleError>;

    /// Current value of `name`; `Null` when the property holds nothing.
    fn get(&self, name: &str) -> Result<PropertyValue, ValidationError>;

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), ValidationError>;

    /// Appends one element to a multivalued property.
    fn add(&mut self, name: &str, value: Value) -> Result<(), ValidationError>;

    /// Drops the value of `name`. Non-nullable properties fall back to
    /// their default instead of becoming null.
    fn remove(&mut self, name: &str) -> Result<(), ValidationError>;

    fn contains(&self, name: &str) -> bool;

    /// Every property of the definition with its value, in definition order.
    /// Permission flags are not applied.
    fn snapshot(&self) -> Vec<(String, PropertyValue)>;

    fn clone_box(&self) -> Box<dyn Aspect>;
}

impl Clone for Box<dyn Aspect> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Checks `entity` against the current binding.
pub(crate) fn rebind(
    current: &mut Entity,
    transferable: bool,
    entity: Entity,
) -> Result<(), LifecycleError> {
    if *current == entity {
        return Ok(());
    }
    if !transferable {
        return Err(LifecycleError::AspectAlreadyAttached {
            current: *current,
            requested: entity,
        });
    }
    *current = entity;
    Ok(())
}

#[derive(Debug, Clone)]
struct PropertyBag {
    entity: Entity,
    def: Arc<AspectDef>,
    transferable: bool,
    values: HashMap<String, PropertyValue>,
}

impl PropertyBag {
    fn new(entity: Entity, def: Arc<AspectDef>) -> Self {
        let values = def
            .properties()
            .iter()
            .filter(|property| property.has_default_value())
            .map(|property| (property.name().to_string(), property.initial_value()))
            .collect();
        Self {
            entity,
            def,
            transferable: false,
            values,
        }
    }

    fn property(&self, name: &str) -> Result<&PropertyDef, ValidationError> {
        self.def.require_property(name)
    }

    /// Resolves `name` for a write, honouring both permission levels.
    fn writable(&self, name: &str) -> Result<&PropertyDef, ValidationError> {
        if !self.def.is_writable() {
            return Err(ValidationError::NotWritable {
                aspect_def: self.def.name().to_string(),
                property: None,
            });
        }
        let property = self.property(name)?;
        if !property.is_writable() {
            return Err(ValidationError::NotWritable {
                aspect_def: self.def.name().to_string(),
                property: Some(name.to_string()),
            });
        }
        Ok(property)
    }

    fn get(&self, name: &str) -> Result<PropertyValue, ValidationError> {
        self.property(name)?;
        Ok(self.values.get(name).cloned().unwrap_or_default())
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), ValidationError> {
        let checked = self.writable(name)?.validate(value)?;
        self.values.insert(name.to_string(), checked);
        Ok(())
    }

    /// Stores a persisted value; only shape, type and nullability apply.
    fn store(&mut self, name: &str, value: PropertyValue) -> Result<(), ValidationError> {
        let checked = self.property(name)?.validate(value)?;
        self.values.insert(name.to_string(), checked);
        Ok(())
    }

    fn add(&mut self, name: &str, value: Value) -> Result<(), ValidationError> {
        let property = self.writable(name)?;
        if !property.is_multivalued() {
            return Err(ValidationError::ExpectedSingleValued {
                property: name.to_string(),
            });
        }
        let value = property.property_type().coerce(name, value)?;
        match self.values.get_mut(name) {
            Some(PropertyValue::Multi(values)) => values.push(value),
            _ => {
                self.values
                    .insert(name.to_string(), PropertyValue::Multi(vec![value]));
            }
        }
        Ok(())
    }

    /// Empties `name`. A non-nullable property falls back to its default
    /// and fails when it has none.
    fn remove(&mut self, name: &str) -> Result<(), ValidationError> {
        let property = self.writable(name)?;
        if !property.is_removable() {
            return Err(ValidationError::NotRemovable {
                aspect_def: self.def.name().to_string(),
                property: name.to_string(),
            });
        }
        if property.is_nullable() {
            self.values.remove(name);
            return Ok(());
        }
        let reset = match property.default_value() {
            Some(value) if !value.is_null() => value.clone(),
            _ if property.is_multivalued() => PropertyValue::Multi(Vec::new()),
            _ => {
                return Err(ValidationError::NullNotAllowed {
                    property: name.to_string(),
                })
            }
        };
        self.values.insert(name.to_string(), reset);
        Ok(())
    }

    fn snapshot(&self) -> Vec<(String, PropertyValue)> {
        self.def
            .properties()
            .iter()
            .map(|property| {
                let value = self.values.get(property.name()).cloned().unwrap_or_default();
                (property.name().to_string(), value)
            })
            .collect()
    }
}

/// Plain map aspect: checks schema membership, shape, type, nullability and
/// write permissions. Read flags are not applied.
#[derive(Debug, Clone)]
pub struct MapAspect {
    bag: PropertyBag,
}

impl MapAspect {
    /// New aspect holding each property's declared default, if any.
    pub fn new(entity: Entity, def: Arc<AspectDef>) -> Self {
        Self {
            bag: PropertyBag::new(entity, def),
        }
    }

    pub fn transferable(mut self, transferable: bool) -> Self {
        self.bag.transferable = transferable;
        self
    }

    pub fn with(mut self, name: &str, value: impl Into<PropertyValue>) -> Result<Self, ValidationError> {
        self.bag.set(name, value.into())?;
        Ok(self)
    }
}

impl Aspect for MapAspect {
    fn entity(&self) -> Entity {
        self.bag.entity
    }

    fn def(&self) -> &Arc<AspectDef> {
        &self.bag.def
    }

    fn is_transferable(&self) -> bool {
        self.bag.transferable
    }

    fn attach(&mut self, entity: Entity) -> Result<(), LifecycleError> {
        rebind(&mut self.bag.entity, self.bag.transferable, entity)
    }

    fn get(&self, name: &str) -> Result<PropertyValue, ValidationError> {
        self.bag.get(name)
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), ValidationError> {
        self.bag.set(name, value)
    }

    fn add(&mut self, name: &str, value: Value) -> Result<(), ValidationError> {
        self.bag.add(name, value)
    }

    fn remove(&mut self, name: &str) -> Result<(), ValidationError> {
        self.bag.remove(name)
    }

    fn contains(&self, name: &str) -> bool {
        self.bag.values.contains_key(name)
    }

    fn snapshot(&self) -> Vec<(String, PropertyValue)> {
        self.bag.snapshot()
    }

    fn clone_box(&self) -> Box<dyn Aspect> {
        Box::new(self.clone())
    }
}

/// Map aspect that also enforces the definition's read flags.
#[derive(Debug, Clone)]
pub struct CheckedAspect {
    bag: PropertyBag,
}

impl CheckedAspect {
    pub fn new(entity: Entity, def: Arc<AspectDef>) -> Self {
        Self {
            bag: PropertyBag::new(entity, def),
        }
    }

    /// Rebuilds a persisted aspect without applying write permissions.
    pub fn restore(
        entity: Entity,
        def: Arc<AspectDef>,
        values: Vec<(String, PropertyValue)>,
    ) -> Result<Self, ValidationError> {
        let mut bag = PropertyBag::new(entity, def);
        bag.values.clear();
        for (name, value) in values {
            bag.store(&name, value)?;
        }
        Ok(Self { bag })
    }

    pub fn transferable(mut self, transferable: bool) -> Self {
        self.bag.transferable = transferable;
        self
    }

    pub fn with(mut self, name: &str, value: impl Into<PropertyValue>) -> Result<Self, ValidationError> {
        self.set(name, value.into())?;
        Ok(self)
    }

    fn readable(&self, name: &str) -> Result<&PropertyDef, ValidationError> {
        let def = &self.bag.def;
        if !def.is_readable() {
            return Err(ValidationError::NotReadable {
                aspect_def: def.name().to_string(),
                property: None,
            });
        }
        let property = def.require_property(name)?;
        if !property.is_readable() {
            return Err(ValidationError::NotReadable {
                aspect_def: def.name().to_string(),
                property: Some(name.to_string()),
            });
        }
        Ok(property)
    }
}

impl Aspect for CheckedAspect {
    fn entity(&self) -> Entity {
        self.bag.entity
    }

    fn def(&self) -> &Arc<AspectDef> {
        &self.bag.def
    }

    fn is_transferable(&self) -> bool {
        self.bag.transferable
    }

    fn attach(&mut self, entity: Entity) -> Result<(), LifecycleError> {
        rebind(&mut self.bag.entity, self.bag.transferable, entity)
    }

    fn get(&self, name: &str) -> Result<PropertyValue, ValidationError> {
        self.readable(name)?;
        self.bag.get(name)
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), ValidationError> {
        self.bag.set(name, value)
    }

    fn add(&mut self, name: &str, value: Value) -> Result<(), ValidationError> {
        self.bag.add(name, value)
    }

    fn remove(&mut self, name: &str) -> Result<(), ValidationError> {
        self.bag.remove(name)
    }

    fn contains(&self, name: &str) -> bool {
        self.bag.values.contains_key(name)
    }

    fn snapshot(&self) -> Vec<(String, PropertyValue)> {
        self.bag.snapshot()
    }

    fn clone_box(&self) -> Box<dyn Aspect> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{Aspect, CheckedAspect, MapAspect};
    use crate::model::aspect_def::AspectDef;
    use crate::model::entity::Entity;
    use crate::model::error::{LifecycleError, ValidationError};
    use crate::model::property_def::PropertyDef;
    use crate::model::value::{PropertyType, PropertyValue, Value};
    use std::sync::Arc;

    fn def() -> Arc<AspectDef> {
        Arc::new(
            AspectDef::mutable(
                "doc",
                vec![
                    PropertyDef::builder("title", PropertyType::String)
                        .nullable(false)
                        .default_value("untitled")
                        .build()
                        .unwrap(),
                    PropertyDef::builder("id", PropertyType::Integer)
                        .writable(false)
                        .removable(false)
                        .build()
                        .unwrap(),
                    PropertyDef::builder("tags", PropertyType::String)
                        .multivalued(true)
                        .build()
                        .unwrap(),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn defaults_are_applied() {
        let aspect = MapAspect::new(Entity::new(), def());
        assert_eq!(aspect.get("title").unwrap(), PropertyValue::single("untitled"));
        assert!(aspect.contains("title"));
        assert!(!aspect.contains("id"));
        assert_eq!(aspect.get("id").unwrap(), PropertyValue::Null);
    }

    #[test]
    fn unknown_property_is_an_error() {
        let mut aspect = MapAspect::new(Entity::new(), def());
        assert!(matches!(
            aspect.get("nope"),
            Err(ValidationError::UnknownProperty { .. })
        ));
        assert!(aspect.set("nope", PropertyValue::single(1_i64)).is_err());
    }

    #[test]
    fn map_aspect_enforces_write_permissions() {
        let mut aspect = MapAspect::new(Entity::new(), def());
        let err = aspect.set("id", PropertyValue::single(7_i64)).unwrap_err();
        assert!(matches!(err, ValidationError::NotWritable { .. }));
        assert_eq!(aspect.get("id").unwrap(), PropertyValue::Null);
        assert!(matches!(
            aspect.set("title", PropertyValue::Null),
            Err(ValidationError::NullNotAllowed { .. })
        ));

        let frozen = Arc::new(
            AspectDef::immutable(
                "frozen",
                vec![PropertyDef::builder("x", PropertyType::Integer)
                    .build()
                    .unwrap()],
            )
            .unwrap(),
        );
        let mut aspect = MapAspect::new(Entity::new(), frozen);
        assert!(matches!(
            aspect.set("x", PropertyValue::single(1_i64)),
            Err(ValidationError::NotWritable { property: None, .. })
        ));
        assert!(aspect.remove("x").is_err());
        assert_eq!(aspect.get("x").unwrap(), PropertyValue::Null);
    }

    #[test]
    fn removing_non_nullable_falls_back_to_default_or_fails() {
        let mut aspect = MapAspect::new(Entity::new(), def());
        aspect.set("title", PropertyValue::single("draft")).unwrap();
        aspect.remove("title").unwrap();
        assert_eq!(aspect.get("title").unwrap(), PropertyValue::single("untitled"));

        let strict = Arc::new(
            AspectDef::mutable(
                "named",
                vec![PropertyDef::builder("name", PropertyType::String)
                    .nullable(false)
                    .build()
                    .unwrap()],
            )
            .unwrap(),
        );
        let mut aspect = MapAspect::new(Entity::new(), strict)
            .with("name", PropertyValue::single("x"))
            .unwrap();
        assert!(matches!(
            aspect.remove("name"),
            Err(ValidationError::NullNotAllowed { .. })
        ));
        assert_eq!(aspect.get("name").unwrap(), PropertyValue::single("x"));
    }

    #[test]
    fn restore_rejects_null_for_non_nullable() {
        let err = CheckedAspect::restore(
            Entity::new(),
            def(),
            vec![("title".to_string(), PropertyValue::Null)],
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::NullNotAllowed { .. }));
    }

    #[test]
    fn checked_aspect_enforces_writable() {
        let mut aspect = CheckedAspect::new(Entity::new(), def());
        let err = aspect.set("id", PropertyValue::single(7_i64)).unwrap_err();
        assert!(matches!(err, ValidationError::NotWritable { .. }));
        assert_eq!(aspect.get("id").unwrap(), PropertyValue::Null);
        assert!(aspect.remove("id").is_err());
    }

    #[test]
    fn restore_bypasses_write_permission() {
        let aspect = CheckedAspect::restore(
            Entity::new(),
            def(),
            vec![("id".to_string(), PropertyValue::single(9_i64))],
        )
        .unwrap();
        assert_eq!(aspect.get("id").unwrap(), PropertyValue::single(9_i64));
    }

    #[test]
    fn add_appends_in_order() {
        let mut aspect = MapAspect::new(Entity::new(), def());
        aspect.add("tags", Value::from("a")).unwrap();
        aspect.add("tags", Value::from("b")).unwrap();
        assert_eq!(aspect.get("tags").unwrap(), PropertyValue::multi(["a", "b"]));
        assert!(aspect.add("title", Value::from("x")).is_err());
    }

    #[test]
    fn reattach_requires_transferable() {
        let first = Entity::new();
        let second = Entity::new();
        let mut fixed = MapAspect::new(first, def());
        assert!(fixed.attach(first).is_ok());
        assert_eq!(
            fixed.attach(second),
            Err(LifecycleError::AspectAlreadyAttached {
                current: first,
                requested: second,
            })
        );
        let mut moving = MapAspect::new(first, def()).transferable(true);
        moving.attach(second).unwrap();
        assert_eq!(moving.entity(), second);
    }

    #[test]
    fn snapshot_follows_definition_order() {
        let aspect = MapAspect::new(Entity::new(), def());
        let names: Vec<String> = aspect.snapshot().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["title", "id", "tags"]);
    }
}
