//! Path-addressable entity tree.
//!
//! Paths are `/`-separated key sequences starting at the root: `/` is the
//! root itself, `/a/b` is child `b` of child `a`. Keys are non-empty and
//! contain no `/`.

use crate::model::entity::Entity;
use crate::model::error::ValidationError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeNode {
    value: Option<Entity>,
    children: Vec<(String, TreeNode)>,
}

impl TreeNode {
    pub fn value(&self) -> Option<Entity> {
        self.value
    }

    pub fn set_value(&mut self, value: Option<Entity>) {
        self.value = value;
    }

    pub fn child(&self, key: &str) -> Option<&TreeNode> {
        self.children
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, node)| node)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &TreeNode)> {
        self.children.iter().map(|(key, node)| (key.as_str(), node))
    }

    fn child_mut(&mut self, key: &str) -> Option<&mut TreeNode> {
        self.children
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, node)| node)
    }

    fn child_or_insert(&mut self, key: &str) -> &mut TreeNode {
        let index = match self.children.iter().position(|(k, _)| k == key) {
            Some(index) => index,
            None => {
                self.children.push((key.to_string(), TreeNode::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[index].1
    }
}

/// One node as visited by [`EntityTree::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeVisit<'a> {
    pub path: String,
    pub key: &'a str,
    pub parent_index: Option<usize>,
    pub sibling_order: usize,
    pub node: &'a TreeNode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityTree {
    root: TreeNode,
}

impl EntityTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn get(&self, path: &str) -> Result<Option<&TreeNode>, ValidationError> {
        let mut node = &self.root;
        for key in split_path(path)? {
            match node.child(key) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(node))
    }

    pub fn entity_at(&self, path: &str) -> Result<Option<Entity>, ValidationError> {
        Ok(self.get(path)?.and_then(TreeNode::value))
    }

    /// Returns the node at `path`, creating missing nodes on the way.
    pub fn ensure(&mut self, path: &str) -> Result<&mut TreeNode, ValidationError> {
        let keys = split_path(path)?;
        let mut node = &mut self.root;
        for key in keys {
            node = node.child_or_insert(key);
        }
        Ok(node)
    }

    pub fn set(&mut self, path: &str, value: Option<Entity>) -> Result<(), ValidationError> {
        self.ensure(path)?.set_value(value);
        Ok(())
    }

    /// Detaches the subtree at `path`. The root cannot be removed.
    pub fn remove(&mut self, path: &str) -> Result<Option<TreeNode>, ValidationError> {
        let keys = split_path(path)?;
        let Some((last, parents)) = keys.split_last() else {
            return Err(ValidationError::InvalidTreePath {
                path: path.to_string(),
            });
        };
        let mut node = &mut self.root;
        for key in parents {
            match node.child_mut(key) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        let index = node.children.iter().position(|(k, _)| k == last);
        Ok(index.map(|index| node.children.remove(index).1))
    }

    /// Pre-order traversal; the root comes first with path `/`.
    pub fn walk(&self) -> Vec<TreeVisit<'_>> {
        let mut visits = vec![TreeVisit {
            path: "/".to_string(),
            key: "",
            parent_index: None,
            sibling_order: 0,
            node: &self.root,
        }];
        walk_children(&self.root, "", 0, &mut visits);
        visits
    }

    pub fn node_count(&self) -> usize {
        self.walk().len()
    }
}

fn walk_children<'a>(
    node: &'a TreeNode,
    prefix: &str,
    parent_index: usize,
    visits: &mut Vec<TreeVisit<'a>>,
) {
    for (order, (key, child)) in node.children.iter().enumerate() {
        let path = format!("{prefix}/{key}");
        let index = visits.len();
        visits.push(TreeVisit {
            path: path.clone(),
            key,
            parent_index: Some(parent_index),
            sibling_order: order,
            node: child,
        });
        walk_children(child, &path, index, visits);
    }
}

pub(crate) fn split_path(path: &str) -> Result<Vec<&str>, ValidationError> {
    let invalid = || ValidationError::InvalidTreePath {
        path: path.to_string(),
    };
    let rest = path.strip_prefix('/').ok_or_else(invalid)?;
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let keys: Vec<&str> = rest.split('/').collect();
    if keys.iter().any(|key| key.is_empty()) {
        return Err(invalid());
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::{split_path, EntityTree};
    use crate::model::entity::Entity;

    #[test]
    fn paths_are_parsed_strictly() {
        assert_eq!(split_path("/").unwrap(), Vec::<&str>::new());
        assert_eq!(split_path("/a/b").unwrap(), vec!["a", "b"]);
        assert!(split_path("a/b").is_err());
        assert!(split_path("/a//b").is_err());
        assert!(split_path("/a/").is_err());
    }

    #[test]
    fn walk_is_pre_order_with_parent_links() {
        let mut tree = EntityTree::new();
        tree.set("/a/x", Some(Entity::new())).unwrap();
        tree.set("/b", Some(Entity::new())).unwrap();
        tree.ensure("/a/y").unwrap();
        let visits = tree.walk();
        let paths: Vec<&str> = visits.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/a", "/a/x", "/a/y", "/b"]);
        assert_eq!(visits[2].parent_index, Some(1));
        assert_eq!(visits[3].sibling_order, 1);
        assert_eq!(visits[4].parent_index, Some(0));
    }

    #[test]
    fn remove_detaches_subtree() {
        let mut tree = EntityTree::new();
        let entity = Entity::new();
        tree.set("/a/b", Some(entity)).unwrap();
        assert_eq!(tree.entity_at("/a/b").unwrap(), Some(entity));
        let removed = tree.remove("/a").unwrap().unwrap();
        assert_eq!(removed.child("b").unwrap().value(), Some(entity));
        assert!(tree.get("/a").unwrap().is_none());
        assert!(tree.remove("/").is_err());
    }
}
