//! In-memory data model: entities, schemas, aspects, hierarchies, catalogs.
//!
//! # Responsibility
//! - Define the canonical object graph the persistence engine saves and
//!   loads.
//! - Enforce schema, permission and lifecycle rules at the point of change.
//!
//! # Invariants
//! - Schema descriptors are identified by their structural hash, not by
//!   instance identity.
//! - Nothing in this module touches storage.
//!
//! # See also
//! - `repo` for persistence.

pub mod aspect;
pub mod aspect_def;
pub mod catalog;
pub mod entity;
pub mod error;
pub mod hash;
pub mod hierarchy;
pub mod property_def;
pub mod record;
pub mod registry;
pub mod value;

pub use aspect::{Aspect, CheckedAspect, MapAspect};
pub use aspect_def::{AspectCapabilities, AspectDef, AspectDefProfile};
pub use catalog::{Catalog, CatalogId, Species};
pub use entity::{Entity, EntityRegistry};
pub use error::{LifecycleError, ModelError, ModelResult, ValidationError};
pub use hierarchy::{
    AspectMap, EntityDirectory, EntityList, EntitySet, EntityTree, Hierarchy, HierarchyContent,
    HierarchyType, TreeNode,
};
pub use property_def::{PropertyDef, PropertyDefBuilder};
pub use record::{RecordAspect, RecordBinding, RecordBindingBuilder};
pub use registry::AspectDefRegistry;
pub use value::{PropertyType, PropertyValue, Value};
