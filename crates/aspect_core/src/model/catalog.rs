//! Catalogs: the unit of persistence.
//!
//! # Responsibility
//! - Own a set of aspect definitions and named hierarchies.
//! - Carry provenance (species + upstream) and a manual version counter.
//!
//! # Invariants
//! - `Source` and `Sink` catalogs have no upstream; every other species has
//!   exactly one. Checked when the catalog is built.
//! - Hierarchy names are unique; at most one aspect map per definition.
//! - Definition names are unique; every aspect map's definition is linked.

use crate::model::aspect_def::AspectDef;
use crate::model::error::{LifecycleError, ValidationError};
use crate::model::hierarchy::{AspectMap, Hierarchy, HierarchyContent};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub type CatalogId = Uuid;

/// Provenance relation of a catalog to other catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Species {
    Source,
    Sink,
    Mirror,
    Cache,
    Clone,
    Fork,
}

impl Species {
    pub const ALL: [Species; 6] = [
        Self::Source,
        Self::Sink,
        Self::Mirror,
        Self::Cache,
        Self::Clone,
        Self::Fork,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "SOURCE",
            Self::Sink => "SINK",
            Self::Mirror => "MIRROR",
            Self::Cache => "CACHE",
            Self::Clone => "CLONE",
            Self::Fork => "FORK",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    pub fn requires_upstream(self) -> bool {
        !matches!(self, Self::Source | Self::Sink)
    }
}

impl Display for Species {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    id: CatalogId,
    species: Species,
    uri: Option<String>,
    upstream: Option<CatalogId>,
    version: i64,
    aspect_defs: Vec<Arc<AspectDef>>,
    hierarchies: Vec<Hierarchy>,
}

impl Catalog {
    pub fn new(species: Species, upstream: Option<CatalogId>) -> Result<Self, LifecycleError> {
        Self::with_id(Uuid::new_v4(), species, upstream)
    }

    pub fn with_id(
        id: CatalogId,
        species: Species,
        upstream: Option<CatalogId>,
    ) -> Result<Self, LifecycleError> {
        if species.requires_upstream() != upstream.is_some() {
            return Err(LifecycleError::InvalidUpstream { species, upstream });
        }
        Ok(Self {
            id,
            species,
            uri: None,
            upstream,
            version: 0,
            aspect_defs: Vec::new(),
            hierarchies: Vec::new(),
        })
    }

    pub fn id(&self) -> CatalogId {
        self.id
    }

    pub fn species(&self) -> Species {
        self.species
    }

    pub fn upstream(&self) -> Option<CatalogId> {
        self.upstream
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn set_uri(&mut self, uri: Option<String>) {
        self.uri = uri;
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    /// Marks a committed structural change.
    pub fn bump_version(&mut self) -> i64 {
        self.version += 1;
        self.version
    }

    /// Links `def`, returning the linked instance.
    ///
    /// Re-adding a structurally identical definition returns the one already
    /// linked; a different definition under a linked name is rejected.
    pub fn add_aspect_def(&mut self, def: Arc<AspectDef>) -> Result<Arc<AspectDef>, ValidationError> {
        if let Some(existing) = self.aspect_def(def.name()) {
            if Arc::ptr_eq(existing, &def) || **existing == *def {
                return Ok(Arc::clone(existing));
            }
            return Err(ValidationError::ConflictingAspectDef {
                name: def.name().to_string(),
            });
        }
        self.aspect_defs.push(Arc::clone(&def));
        Ok(def)
    }

    pub fn aspect_def(&self, name: &str) -> Option<&Arc<AspectDef>> {
        self.aspect_defs.iter().find(|def| def.name() == name)
    }

    pub fn aspect_defs(&self) -> &[Arc<AspectDef>] {
        &self.aspect_defs
    }

    /// Adds a hierarchy; an aspect map also links its definition.
    pub fn add_hierarchy(&mut self, hierarchy: Hierarchy) -> Result<&mut Hierarchy, ValidationError> {
        if self.hierarchy(hierarchy.name()).is_some() {
            return Err(ValidationError::DuplicateHierarchy {
                name: hierarchy.name().to_string(),
            });
        }
        if let Some(map) = hierarchy.as_aspect_map() {
            let def_name = map.def().name();
            if self.aspect_map_for(def_name).is_some() {
                return Err(ValidationError::DuplicateAspectMap {
                    aspect_def: def_name.to_string(),
                });
            }
            self.add_aspect_def(Arc::clone(map.def()))?;
        }
        self.hierarchies.push(hierarchy);
        let last = self.hierarchies.len() - 1;
        Ok(&mut self.hierarchies[last])
    }

    pub fn hierarchy(&self, name: &str) -> Option<&Hierarchy> {
        self.hierarchies.iter().find(|h| h.name() == name)
    }

    pub fn hierarchy_mut(&mut self, name: &str) -> Option<&mut Hierarchy> {
        self.hierarchies.iter_mut().find(|h| h.name() == name)
    }

    pub fn remove_hierarchy(&mut self, name: &str) -> Option<Hierarchy> {
        let index = self.hierarchies.iter().position(|h| h.name() == name)?;
        Some(self.hierarchies.remove(index))
    }

    pub fn hierarchies(&self) -> &[Hierarchy] {
        &self.hierarchies
    }

    /// The aspect map holding aspects of the named definition, if any.
    pub fn aspect_map_for(&self, aspect_def: &str) -> Option<&AspectMap> {
        self.hierarchies.iter().find_map(|h| match h.content() {
            HierarchyContent::AspectMap(map) if map.def().name() == aspect_def => Some(map),
            _ => None,
        })
    }
}

/// Structural equality: definitions and hierarchies compared by content,
/// hierarchies and definitions in any order.
impl PartialEq for Catalog {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.species == other.species
            && self.uri == other.uri
            && self.upstream == other.upstream
            && self.version == other.version
            && self.aspect_defs.len() == other.aspect_defs.len()
            && self.aspect_defs.iter().all(|def| {
                other
                    .aspect_def(def.name())
                    .is_some_and(|theirs| **theirs == **def)
            })
            && self.hierarchies.len() == other.hierarchies.len()
            && self
                .hierarchies
                .iter()
                .all(|h| other.hierarchy(h.name()) == Some(h))
    }
}

#[cfg(test)]
mod tests {
    use super::{Catalog, Species};
    use crate::model::aspect_def::AspectDef;
    use crate::model::error::{LifecycleError, ValidationError};
    use crate::model::hierarchy::{AspectMap, EntityList, Hierarchy, HierarchyContent};
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn species_names_parse_back() {
        for species in Species::ALL {
            assert_eq!(Species::parse(species.as_str()), Some(species));
        }
    }

    #[test]
    fn upstream_rules_are_enforced_at_construction() {
        assert!(Catalog::new(Species::Source, None).is_ok());
        assert!(Catalog::new(Species::Sink, None).is_ok());
        assert!(Catalog::new(Species::Fork, Some(Uuid::new_v4())).is_ok());
        assert!(matches!(
            Catalog::new(Species::Source, Some(Uuid::new_v4())),
            Err(LifecycleError::InvalidUpstream { .. })
        ));
        assert!(matches!(
            Catalog::new(Species::Mirror, None),
            Err(LifecycleError::InvalidUpstream { .. })
        ));
    }

    #[test]
    fn version_is_manual() {
        let mut catalog = Catalog::new(Species::Source, None).unwrap();
        assert_eq!(catalog.version(), 0);
        catalog
            .add_aspect_def(Arc::new(AspectDef::mutable("a", vec![]).unwrap()))
            .unwrap();
        assert_eq!(catalog.version(), 0);
        assert_eq!(catalog.bump_version(), 1);
    }

    #[test]
    fn hierarchy_names_and_aspect_maps_are_unique() {
        let mut catalog = Catalog::new(Species::Source, None).unwrap();
        let def = Arc::new(AspectDef::mutable("a", vec![]).unwrap());
        catalog
            .add_hierarchy(Hierarchy::new("l", HierarchyContent::List(EntityList::new())).unwrap())
            .unwrap();
        assert!(matches!(
            catalog.add_hierarchy(
                Hierarchy::new("l", HierarchyContent::List(EntityList::new())).unwrap()
            ),
            Err(ValidationError::DuplicateHierarchy { .. })
        ));
        catalog
            .add_hierarchy(
                Hierarchy::new("m1", HierarchyContent::AspectMap(AspectMap::new(Arc::clone(&def))))
                    .unwrap(),
            )
            .unwrap();
        assert!(catalog.aspect_def("a").is_some());
        assert!(matches!(
            catalog.add_hierarchy(
                Hierarchy::new("m2", HierarchyContent::AspectMap(AspectMap::new(def))).unwrap()
            ),
            Err(ValidationError::DuplicateAspectMap { .. })
        ));
    }

    #[test]
    fn conflicting_definition_name_is_rejected() {
        use crate::model::property_def::PropertyDef;
        use crate::model::value::PropertyType;

        let mut catalog = Catalog::new(Species::Source, None).unwrap();
        catalog
            .add_aspect_def(Arc::new(AspectDef::mutable("a", vec![]).unwrap()))
            .unwrap();
        let other = AspectDef::mutable(
            "a",
            vec![PropertyDef::builder("x", PropertyType::String)
                .build()
                .unwrap()],
        )
        .unwrap();
        assert!(catalog.add_aspect_def(Arc::new(other)).is_err());
    }
}
