//! Named, typed collections inside a catalog.
//!
//! # Responsibility
//! - Provide the five content variants and a common named wrapper.
//!
//! # Invariants
//! - The variant of a hierarchy never changes after construction.
//! - Only `AspectMap` carries property data; the others hold bare entities.

mod aspect_map;
mod directory;
mod list;
mod set;
mod tree;

pub use aspect_map::AspectMap;
pub use directory::EntityDirectory;
pub use list::EntityList;
pub use set::EntitySet;
pub use tree::{EntityTree, TreeNode, TreeVisit};

use crate::model::error::ValidationError;
use crate::model::property_def::validate_name;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HierarchyType {
    EntityList,
    EntitySet,
    EntityDirectory,
    EntityTree,
    AspectMap,
}

impl HierarchyType {
    pub const ALL: [HierarchyType; 5] = [
        Self::EntityList,
        Self::EntitySet,
        Self::EntityDirectory,
        Self::EntityTree,
        Self::AspectMap,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EntityList => "entity_list",
            Self::EntitySet => "entity_set",
            Self::EntityDirectory => "entity_directory",
            Self::EntityTree => "entity_tree",
            Self::AspectMap => "aspect_map",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.as_str() == value)
    }
}

impl Display for HierarchyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HierarchyContent {
    List(EntityList),
    Set(EntitySet),
    Directory(EntityDirectory),
    Tree(EntityTree),
    AspectMap(AspectMap),
}

impl HierarchyContent {
    pub fn hierarchy_type(&self) -> HierarchyType {
        match self {
            Self::List(_) => HierarchyType::EntityList,
            Self::Set(_) => HierarchyType::EntitySet,
            Self::Directory(_) => HierarchyType::EntityDirectory,
            Self::Tree(_) => HierarchyType::EntityTree,
            Self::AspectMap(_) => HierarchyType::AspectMap,
        }
    }
}

/// A named collection with its own version counter.
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    name: String,
    version: i64,
    content: HierarchyContent,
}

impl Hierarchy {
    pub fn new(name: impl Into<String>, content: HierarchyContent) -> Result<Self, ValidationError> {
        let name = name.into();
        validate_name("hierarchy", &name)?;
        Ok(Self {
            name,
            version: 0,
            content,
        })
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn bump_version(&mut self) -> i64 {
        self.version += 1;
        self.version
    }

    pub fn hierarchy_type(&self) -> HierarchyType {
        self.content.hierarchy_type()
    }

    pub fn content(&self) -> &HierarchyContent {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut HierarchyContent {
        &mut self.content
    }

    pub fn as_list_mut(&mut self) -> Option<&mut EntityList> {
        match &mut self.content {
            HierarchyContent::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_set_mut(&mut self) -> Option<&mut EntitySet> {
        match &mut self.content {
            HierarchyContent::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_directory_mut(&mut self) -> Option<&mut EntityDirectory> {
        match &mut self.content {
            HierarchyContent::Directory(directory) => Some(directory),
            _ => None,
        }
    }

    pub fn as_tree_mut(&mut self) -> Option<&mut EntityTree> {
        match &mut self.content {
            HierarchyContent::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_aspect_map(&self) -> Option<&AspectMap> {
        match &self.content {
            HierarchyContent::AspectMap(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_aspect_map_mut(&mut self) -> Option<&mut AspectMap> {
        match &mut self.content {
            HierarchyContent::AspectMap(map) => Some(map),
            _ => None,
        }
    }
}
