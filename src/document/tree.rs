//! The tree overlay: a rooted tree of elements indexed by id.
//!
//! `TreeModel` owns every element and keeps two indices in step with each
//! other: id → element and parent → ordered children. Every mutating
//! operation validates first and then updates both, so a failed call leaves
//! the model untouched.
//!
//! # Example
//!
//! ```
//! use savequill::document::tree::{TreeElement, TreeModel};
//!
//! let elements = vec![
//!     TreeElement::new(0, None, -1, "Root"),
//!     TreeElement::new(1, Some(0), 0, "inventory"),
//!     TreeElement::new(2, Some(1), 1, "0"),
//! ];
//! let tree = TreeModel::from_elements(elements).unwrap();
//!
//! assert_eq!(tree.children(0), &[1]);
//! assert_eq!(tree.descendants(0), vec![1, 2]);
//! ```

use crate::error::TreeError;
use std::collections::HashMap;

/// Identifier of an element, unique for the lifetime of a loaded save.
pub type NodeId = u32;

/// Hands out monotonically increasing element ids.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: NodeId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// The generic part of every tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeElement {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    /// Root is -1, its children 0, and so on
    pub(crate) depth: i32,
    pub(crate) name: String,
}

impl TreeElement {
    pub fn new(id: NodeId, parent: Option<NodeId>, depth: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            parent,
            depth,
            name: name.into(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn depth(&self) -> i32 {
        self.depth
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

/// Anything that can be stored in a [`TreeModel`].
pub trait TreeItem {
    fn element(&self) -> &TreeElement;
    fn element_mut(&mut self) -> &mut TreeElement;

    fn id(&self) -> NodeId {
        self.element().id
    }

    fn parent(&self) -> Option<NodeId> {
        self.element().parent
    }

    fn depth(&self) -> i32 {
        self.element().depth
    }

    fn name(&self) -> &str {
        &self.element().name
    }
}

impl TreeItem for TreeElement {
    fn element(&self) -> &TreeElement {
        self
    }

    fn element_mut(&mut self) -> &mut TreeElement {
        self
    }
}

/// A single rooted tree with id and parent → children indices.
#[derive(Debug, Clone)]
pub struct TreeModel<T: TreeItem> {
    root: NodeId,
    items: HashMap<NodeId, T>,
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl<T: TreeItem> TreeModel<T> {
    /// Builds a model from a pre-order list whose first element is the root.
    ///
    /// Every later element's parent must appear earlier in the list and its
    /// depth must be one more than its parent's.
    pub fn from_elements(elements: Vec<T>) -> Result<Self, TreeError> {
        let mut iter = elements.into_iter();
        let root = iter.next().ok_or(TreeError::Empty)?;
        if root.parent().is_some() || root.depth() != -1 {
            return Err(TreeError::BadRoot);
        }

        let root_id = root.id();
        let mut model = Self {
            root: root_id,
            items: HashMap::new(),
            children: HashMap::new(),
        };
        model.items.insert(root_id, root);
        model.children.insert(root_id, Vec::new());

        for item in iter {
            model.append_child(item)?;
        }

        Ok(model)
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> &T {
        &self.items[&self.root]
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ordered children of an element; empty for leaves and unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.items.get(&id).and_then(|item| item.parent())
    }

    /// Position of an element among its siblings.
    pub fn sibling_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent_of(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// All descendants of an element in pre-order, not including itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(ancestor) = current {
            out.push(ancestor);
            current = self.parent_of(ancestor);
        }
        out
    }

    /// Every element in pre-order, starting with the root.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .filter_map(move |id| self.items.get(&id))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.items.values_mut()
    }

    /// Appends an element as the last child of its parent.
    pub fn append_child(&mut self, item: T) -> Result<NodeId, TreeError> {
        self.check_insertable(&item)?;
        let id = item.id();
        self.link(item, None);
        Ok(id)
    }

    /// Attaches a pre-order subtree under `parent` at child `position`.
    ///
    /// The first element is the subtree root; it is re-parented under
    /// `parent`. The rest must hang off elements earlier in the list.
    /// Depths are recomputed from `parent`.
    pub fn attach_subtree(
        &mut self,
        parent: NodeId,
        position: usize,
        mut subtree: Vec<T>,
    ) -> Result<NodeId, TreeError> {
        let parent_depth = self
            .items
            .get(&parent)
            .map(|p| p.depth())
            .ok_or(TreeError::UnknownElement(parent))?;
        if subtree.is_empty() {
            return Err(TreeError::Empty);
        }

        // validate the whole run before touching the model
        let mut depths: HashMap<NodeId, i32> = HashMap::new();
        for (index, item) in subtree.iter_mut().enumerate() {
            let id = item.id();
            if self.items.contains_key(&id) || depths.contains_key(&id) {
                return Err(TreeError::DuplicateId(id));
            }
            let depth = if index == 0 {
                item.element_mut().parent = Some(parent);
                parent_depth + 1
            } else {
                let item_parent = item.parent().ok_or(TreeError::BadRoot)?;
                let Some(parent_depth) = depths.get(&item_parent) else {
                    return Err(TreeError::MissingParent {
                        child: id,
                        parent: item_parent,
                    });
                };
                parent_depth + 1
            };
            item.element_mut().depth = depth;
            depths.insert(id, depth);
        }

        let root_id = subtree[0].id();
        let mut iter = subtree.into_iter();
        if let Some(first) = iter.next() {
            self.link(first, Some(position));
        }
        for item in iter {
            self.link(item, None);
        }
        Ok(root_id)
    }

    /// Removes an element and all of its descendants, returning them in
    /// pre-order with the element first.
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<T>, TreeError> {
        if id == self.root {
            return Err(TreeError::RootImmutable);
        }
        let parent = self.parent_of(id).ok_or(TreeError::UnknownElement(id))?;

        let mut doomed = vec![id];
        doomed.extend(self.descendants(id));

        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|&c| c != id);
        }

        let mut removed = Vec::with_capacity(doomed.len());
        for gone in doomed {
            self.children.remove(&gone);
            if let Some(item) = self.items.remove(&gone) {
                removed.push(item);
            }
        }
        Ok(removed)
    }

    fn check_insertable(&self, item: &T) -> Result<(), TreeError> {
        let id = item.id();
        if self.items.contains_key(&id) {
            return Err(TreeError::DuplicateId(id));
        }
        let parent = item.parent().ok_or(TreeError::BadRoot)?;
        let parent_item = self.items.get(&parent).ok_or(TreeError::MissingParent {
            child: id,
            parent,
        })?;
        if item.depth() != parent_item.depth() + 1 {
            return Err(TreeError::BadDepth {
                child: id,
                expected: parent_item.depth() + 1,
                found: item.depth(),
            });
        }
        Ok(())
    }

    /// Inserts an already validated item into both indices.
    fn link(&mut self, item: T, position: Option<usize>) {
        let id = item.id();
        if let Some(parent) = item.parent() {
            let siblings = self.children.entry(parent).or_default();
            match position {
                Some(at) if at < siblings.len() => siblings.insert(at, id),
                _ => siblings.push(id),
            }
        }
        self.children.entry(id).or_default();
        self.items.insert(id, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeModel<TreeElement> {
        // Root
        // ├── a (1)
        // │   ├── a0 (2)
        // │   └── a1 (3)
        // └── b (4)
        TreeModel::from_elements(vec![
            TreeElement::new(0, None, -1, "Root"),
            TreeElement::new(1, Some(0), 0, "a"),
            TreeElement::new(2, Some(1), 1, "a0"),
            TreeElement::new(3, Some(1), 1, "a1"),
            TreeElement::new(4, Some(0), 0, "b"),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_elements_builds_indices() {
        let tree = sample();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.children(0), &[1, 4]);
        assert_eq!(tree.children(1), &[2, 3]);
        assert_eq!(tree.parent_of(3), Some(1));
        assert_eq!(tree.root().name(), "Root");
    }

    #[test]
    fn test_from_elements_rejects_orphans_and_bad_depth() {
        let orphan = TreeModel::from_elements(vec![
            TreeElement::new(0, None, -1, "Root"),
            TreeElement::new(1, Some(7), 0, "x"),
        ]);
        assert_eq!(
            orphan.unwrap_err(),
            TreeError::MissingParent { child: 1, parent: 7 }
        );

        let deep = TreeModel::from_elements(vec![
            TreeElement::new(0, None, -1, "Root"),
            TreeElement::new(1, Some(0), 3, "x"),
        ]);
        assert!(matches!(deep.unwrap_err(), TreeError::BadDepth { .. }));

        let rootless = TreeModel::<TreeElement>::from_elements(vec![TreeElement::new(
            0,
            Some(0),
            0,
            "x",
        )]);
        assert_eq!(rootless.unwrap_err(), TreeError::BadRoot);
    }

    #[test]
    fn test_descendants_and_iter_are_preorder() {
        let tree = sample();
        assert_eq!(tree.descendants(0), vec![1, 2, 3, 4]);
        assert_eq!(tree.descendants(1), vec![2, 3]);
        assert!(tree.descendants(4).is_empty());
        let names: Vec<&str> = tree.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Root", "a", "a0", "a1", "b"]);
    }

    #[test]
    fn test_remove_takes_descendants() {
        let mut tree = sample();
        let removed = tree.remove(1).unwrap();
        let ids: Vec<NodeId> = removed.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.children(0), &[4]);
        assert!(!tree.contains(2));
    }

    #[test]
    fn test_remove_root_is_refused() {
        let mut tree = sample();
        assert_eq!(tree.remove(0).unwrap_err(), TreeError::RootImmutable);
        assert_eq!(tree.remove(99).unwrap_err(), TreeError::UnknownElement(99));
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_attach_subtree_recomputes_depths() {
        let mut tree = sample();
        // generated elsewhere with stale parent/depth for the subtree root
        let subtree = vec![
            TreeElement::new(10, Some(99), 5, "new"),
            TreeElement::new(11, Some(10), 0, "child"),
            TreeElement::new(12, Some(11), 0, "grandchild"),
        ];
        tree.attach_subtree(4, 0, subtree).unwrap();

        assert_eq!(tree.children(4), &[10]);
        assert_eq!(tree.get(10).unwrap().depth(), 1);
        assert_eq!(tree.get(11).unwrap().depth(), 2);
        assert_eq!(tree.get(12).unwrap().depth(), 3);
        assert_eq!(tree.descendants(4), vec![10, 11, 12]);
    }

    #[test]
    fn test_attach_subtree_validates_before_mutating() {
        let mut tree = sample();
        let subtree = vec![
            TreeElement::new(10, None, 0, "new"),
            TreeElement::new(11, Some(42), 0, "lost"),
        ];
        assert!(tree.attach_subtree(4, 0, subtree).is_err());
        assert_eq!(tree.len(), 5);
        assert!(tree.children(4).is_empty());
    }

    #[test]
    fn test_sibling_index_and_ancestors() {
        let tree = sample();
        assert_eq!(tree.sibling_index(3), Some(1));
        assert_eq!(tree.ancestors(3), vec![1, 0]);
        assert_eq!(tree.sibling_index(0), None);
    }

    #[test]
    fn test_id_allocator() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_id(), 0);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
    }
}
