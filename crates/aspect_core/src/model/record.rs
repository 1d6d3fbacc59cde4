//! Aspects backed by a native Rust value.
//!
//! A [`RecordBinding`] is declared once per record type: each property gets
//! a getter closure and, optionally, a setter. The binding derives its
//! `AspectDef` from those declarations, so no lookup happens per access.

use crate::model::aspect::{rebind, Aspect};
use crate::model::aspect_def::{AspectCapabilities, AspectDef};
use crate::model::entity::Entity;
use crate::model::error::{LifecycleError, ValidationError};
use crate::model::property_def::{PropertyDef, PropertyDefBuilder};
use crate::model::value::{PropertyValue, Value};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

type Getter<T> = Arc<dyn Fn(&T) -> PropertyValue + Send + Sync>;
type Setter<T> = Arc<dyn Fn(&mut T, PropertyValue) -> Result<(), ValidationError> + Send + Sync>;

struct Accessor<T> {
    getter: Getter<T>,
    setter: Option<Setter<T>>,
}

/// Statically declared mapping between a record type and an aspect schema.
pub struct RecordBinding<T> {
    def: Arc<AspectDef>,
    accessors: Vec<Accessor<T>>,
}

impl<T> Debug for RecordBinding<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordBinding")
            .field("def", &self.def.name())
            .field("properties", &self.accessors.len())
            .finish()
    }
}

impl<T> RecordBinding<T> {
    pub fn builder(name: impl Into<String>) -> RecordBindingBuilder<T> {
        RecordBindingBuilder {
            name: name.into(),
            properties: Vec::new(),
            accessors: Vec::new(),
        }
    }

    pub fn def(&self) -> &Arc<AspectDef> {
        &self.def
    }

    fn accessor(&self, name: &str) -> Result<(&PropertyDef, &Accessor<T>), ValidationError> {
        let index = self
            .def
            .property_index(name)
            .ok_or_else(|| ValidationError::UnknownProperty {
                aspect_def: self.def.name().to_string(),
                property: name.to_string(),
            })?;
        Ok((&self.def.properties()[index], &self.accessors[index]))
    }
}

pub struct RecordBindingBuilder<T> {
    name: String,
    properties: Vec<PropertyDefBuilder>,
    accessors: Vec<Accessor<T>>,
}

impl<T> RecordBindingBuilder<T> {
    /// Read-only property.
    pub fn getter<G>(mut self, property: PropertyDefBuilder, getter: G) -> Self
    where
        G: Fn(&T) -> PropertyValue + Send + Sync + 'static,
    {
        self.properties
            .push(property.writable(false).removable(false));
        self.accessors.push(Accessor {
            getter: Arc::new(getter),
            setter: None,
        });
        self
    }

    /// Read-write property. The setter receives an already validated value.
    pub fn accessor<G, S>(mut self, property: PropertyDefBuilder, getter: G, setter: S) -> Self
    where
        G: Fn(&T) -> PropertyValue + Send + Sync + 'static,
        S: Fn(&mut T, PropertyValue) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.properties.push(property.removable(false));
        self.accessors.push(Accessor {
            getter: Arc::new(getter),
            setter: Some(Arc::new(setter)),
        });
        self
    }

    pub fn build(self) -> Result<Arc<RecordBinding<T>>, ValidationError> {
        let writable = self.accessors.iter().any(|a| a.setter.is_some());
        let properties = self
            .properties
            .into_iter()
            .map(PropertyDefBuilder::build)
            .collect::<Result<Vec<_>, _>>()?;
        let def = if writable {
            AspectDef::mixed(
                self.name,
                properties,
                AspectCapabilities {
                    readable: true,
                    writable: true,
                    can_add_properties: false,
                    can_remove_properties: false,
                },
            )?
        } else {
            AspectDef::immutable(self.name, properties)?
        };
        Ok(Arc::new(RecordBinding {
            def: Arc::new(def),
            accessors: self.accessors,
        }))
    }
}

/// Aspect view over an owned record.
#[derive(Debug, Clone)]
pub struct RecordAspect<T> {
    entity: Entity,
    binding: Arc<RecordBinding<T>>,
    record: T,
    transferable: bool,
}

impl<T> RecordAspect<T>
where
    T: Clone + Debug + Send + Sync + 'static,
{
    pub fn new(entity: Entity, binding: Arc<RecordBinding<T>>, record: T) -> Self {
        Self {
            entity,
            binding,
            record,
            transferable: false,
        }
    }

    pub fn transferable(mut self, transferable: bool) -> Self {
        self.transferable = transferable;
        self
    }

    pub fn record(&self) -> &T {
        &self.record
    }

    pub fn into_record(self) -> T {
        self.record
    }

    fn setter(&self, name: &str) -> Result<(&PropertyDef, Setter<T>), ValidationError> {
        let (property, accessor) = self.binding.accessor(name)?;
        match &accessor.setter {
            Some(setter) => Ok((property, Arc::clone(setter))),
            None => Err(ValidationError::NotWritable {
                aspect_def: self.binding.def.name().to_string(),
                property: Some(name.to_string()),
            }),
        }
    }
}

impl<T> Aspect for RecordAspect<T>
where
    T: Clone + Debug + Send + Sync + 'static,
{
    fn entity(&self) -> Entity {
        self.entity
    }

    fn def(&self) -> &Arc<AspectDef> {
        &self.binding.def
    }

    fn is_transferable(&self) -> bool {
        self.transferable
    }

    fn attach(&mut self, entity: Entity) -> Result<(), LifecycleError> {
        rebind(&mut self.entity, self.transferable, entity)
    }

    fn get(&self, name: &str) -> Result<PropertyValue, ValidationError> {
        let (_, accessor) = self.binding.accessor(name)?;
        Ok((accessor.getter)(&self.record))
    }

    fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), ValidationError> {
        let (property, setter) = self.setter(name)?;
        let value = property.validate(value)?;
        setter(&mut self.record, value)
    }

    fn add(&mut self, name: &str, value: Value) -> Result<(), ValidationError> {
        let (property, setter) = self.setter(name)?;
        if !property.is_multivalued() {
            return Err(ValidationError::ExpectedSingleValued {
                property: name.to_string(),
            });
        }
        let value = property.property_type().coerce(name, value)?;
        let mut values = match self.get(name)? {
            PropertyValue::Multi(values) => values,
            _ => Vec::new(),
        };
        values.push(value);
        setter(&mut self.record, PropertyValue::Multi(values))
    }

    fn remove(&mut self, name: &str) -> Result<(), ValidationError> {
        self.binding.accessor(name)?;
        Err(ValidationError::NotRemovable {
            aspect_def: self.binding.def.name().to_string(),
            property: name.to_string(),
        })
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).map(|value| !value.is_null()).unwrap_or(false)
    }

    fn snapshot(&self) -> Vec<(String, PropertyValue)> {
        self.binding
            .def
            .properties()
            .iter()
            .zip(&self.binding.accessors)
            .map(|(property, accessor)| {
                (property.name().to_string(), (accessor.getter)(&self.record))
            })
            .collect()
    }

    fn clone_box(&self) -> Box<dyn Aspect> {
        Box::new(self.clone())
    }
}
