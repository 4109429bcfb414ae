//! Editor state for one loaded save.
//!
//! `EditorState` owns the live object graph (inside the [`SaveBlob`]) and the
//! tree of [`ValueNode`]s built from it, and keeps the two consistent: every
//! node's `current_value` equals the graph value at that node's slot. All
//! writes go from the root of the graph down through the owning chain of
//! slots, so a struct nested inside a struct is edited in place rather than
//! through a copy.
//!
//! Value edits live in `editor::edit`, add/remove in `editor::structural`.
//!
//! # Example
//!
//! ```
//! use savequill::document::schema::{ScalarKind, TypeDesc, TypeRegistry};
//! use savequill::document::value::Value;
//! use savequill::document::SaveBlob;
//! use savequill::editor::state::EditorState;
//!
//! let blob = SaveBlob::new(
//!     TypeRegistry::new(),
//!     TypeDesc::list(TypeDesc::scalar(ScalarKind::I32)),
//!     Value::Seq(vec![Value::Int(10), Value::Int(20)]),
//! );
//! let mut state = EditorState::new(blob, 15_000).unwrap();
//!
//! let second = state.find_by_path("1").unwrap();
//! state.edit_value(second, "25").unwrap();
//! assert!(state.is_dirty());
//! assert_eq!(state.blob().root, Value::Seq(vec![Value::Int(10), Value::Int(25)]));
//! ```

use crate::document::node::{Binding, Slot, ValueNode};
use crate::document::schema::TypeRegistry;
use crate::document::tree::{IdAllocator, NodeId, TreeItem, TreeModel};
use crate::document::value::{Step, Value};
use crate::document::walker::{GraphWalker, WalkReport};
use crate::document::SaveBlob;
use crate::error::EditError;

/// A loaded save and the tree overlay built from it.
#[derive(Debug, Clone)]
pub struct EditorState {
    pub(crate) blob: SaveBlob,
    pub(crate) tree: TreeModel<ValueNode>,
    pub(crate) ids: IdAllocator,
    pub(crate) max_nodes: usize,
    truncated: bool,
}

impl EditorState {
    /// Walks `blob` into a fresh tree. At most `max_nodes` nodes are built.
    pub fn new(blob: SaveBlob, max_nodes: usize) -> Result<Self, EditError> {
        let mut ids = IdAllocator::new();
        let (nodes, report) =
            GraphWalker::new(&blob.types, &mut ids, max_nodes).walk_root(&blob.root, &blob.root_type);
        let tree = TreeModel::from_elements(nodes)?;

        tracing::debug!(
            "built tree of {} nodes{}",
            report.nodes,
            if report.truncated { " (truncated)" } else { "" }
        );

        Ok(Self {
            blob,
            tree,
            ids,
            max_nodes,
            truncated: report.truncated,
        })
    }

    pub fn blob(&self) -> &SaveBlob {
        &self.blob
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.blob.types
    }

    pub fn tree(&self) -> &TreeModel<ValueNode> {
        &self.tree
    }

    pub fn root_id(&self) -> NodeId {
        self.tree.root_id()
    }

    /// True once any walk hit the node ceiling.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn node(&self, id: NodeId) -> Result<&ValueNode, EditError> {
        self.tree.get(id).ok_or(EditError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut ValueNode, EditError> {
        self.tree.get_mut(id).ok_or(EditError::UnknownNode(id))
    }

    /// Any node differs from its baseline.
    pub fn is_dirty(&self) -> bool {
        self.tree.iter().any(|node| node.is_dirty())
    }

    /// Makes every node's current value and key its new baseline.
    pub fn rebaseline(&mut self) {
        for node in self.tree.iter_mut() {
            node.rebaseline();
        }
    }

    /// Finds a node by its `/`-separated display path from the root.
    /// An empty path names the root.
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        let mut current = self.tree.root_id();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self
                .tree
                .children(current)
                .iter()
                .copied()
                .find(|&child| self.tree.get(child).is_some_and(|n| n.name() == segment))?;
        }
        Some(current)
    }

    /// The display path of a node, as accepted by [`find_by_path`](Self::find_by_path).
    pub fn path_of(&self, id: NodeId) -> String {
        let mut names: Vec<&str> = self
            .tree
            .ancestors(id)
            .into_iter()
            .rev()
            .skip(1)
            .filter_map(|a| self.tree.get(a).map(|n| n.name()))
            .collect();
        if id != self.tree.root_id() {
            if let Some(node) = self.tree.get(id) {
                names.push(node.name());
            }
        }
        names.join("/")
    }

    /// The chain of slots from the graph root to a node.
    pub(crate) fn steps_to(&self, id: NodeId) -> Result<Vec<Step>, EditError> {
        let mut steps = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current)?;
            let step = match node.key() {
                Slot::Root => break,
                Slot::Index(i) => Step::Index(*i),
                Slot::Entry(key) => Step::Entry(key.clone()),
                Slot::Field(name) => Step::Field(name.clone()),
                // set elements are addressed by position; tree order is set order
                Slot::Member(_) => Step::Member(
                    self.tree
                        .sibling_index(current)
                        .ok_or(EditError::UnknownNode(current))?,
                ),
            };
            steps.push(step);
            current = node.parent().ok_or(EditError::UnknownNode(current))?;
        }
        steps.reverse();
        Ok(steps)
    }

    /// Splits a node's path into the path of its parent container and the
    /// node's own step.
    pub(crate) fn locate(&self, id: NodeId) -> Result<(Vec<Step>, Step), EditError> {
        let mut steps = self.steps_to(id)?;
        let own = steps.pop().ok_or_else(|| {
            EditError::Structural("the root has no slot in a parent container".to_string())
        })?;
        Ok((steps, own))
    }

    pub(crate) fn container_mut(&mut self, path: &[Step]) -> Result<&mut Value, EditError> {
        self.blob.root.at_path_mut(path).ok_or_else(unreachable_slot)
    }

    /// Re-reads `current_value` from the graph for a node and all of its
    /// ancestors.
    pub(crate) fn refresh_from(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Ok(steps) = self.steps_to(node_id) else {
                break;
            };
            let live = self.blob.root.at_path(&steps).cloned();
            let Some(node) = self.tree.get_mut(node_id) else {
                break;
            };
            // record members missing from the blob stay null
            if let Some(value) = live {
                if node.binding() == Binding::Member {
                    node.set_key(Slot::Member(value.fingerprint()));
                    node.element_mut().set_name(value.preview());
                }
                node.set_current_value(value);
            }
            current = node.parent();
        }
    }

    /// Tries `change` on a copy of the graph first when `path` passes through
    /// a set member, and refuses it if that set would end up holding two
    /// equal members. `change` receives the root of the copy.
    pub(crate) fn check_set_members<F>(&self, path: &[Step], change: F) -> Result<(), EditError>
    where
        F: FnOnce(&mut Value) -> Result<(), EditError>,
    {
        if !path.iter().any(|step| matches!(step, Step::Member(_))) {
            return Ok(());
        }
        let mut trial = self.blob.root.clone();
        change(&mut trial)?;
        if has_duplicated_set_along(&trial, path) {
            return Err(EditError::Structural(
                "edit would make two members of a set equal".to_string(),
            ));
        }
        Ok(())
    }

    /// Rekeys the sequence elements under `parent` as 0..n-1.
    pub(crate) fn renumber_children(&mut self, parent: NodeId) {
        let children = self.tree.children(parent).to_vec();
        for (index, child) in children.into_iter().enumerate() {
            if let Some(node) = self.tree.get_mut(child) {
                if node.binding() == Binding::Element && node.key() != &Slot::Index(index) {
                    node.set_key(Slot::Index(index));
                }
            }
        }
    }

    /// Drops the descendants of a node and walks its current value again.
    pub(crate) fn regenerate_children(&mut self, id: NodeId) -> Result<WalkReport, EditError> {
        let old_children = self.tree.children(id).to_vec();
        for child in old_children {
            self.tree.remove(child)?;
        }

        let node = self.node(id)?;
        let value = node.current_value().clone();
        let ty = node.declared_type().clone();
        let depth = node.depth();

        let mut scratch = Vec::new();
        let mut walker = GraphWalker::new(&self.blob.types, &mut self.ids, self.max_nodes);
        walker.walk_children(id, depth, &value, &ty, &mut scratch);
        let report = walker.finish();
        if report.truncated {
            self.truncated = true;
        }

        self.attach_runs(id, scratch)?;
        Ok(report)
    }

    /// Attaches a pre-order list of descendants of `parent` as new subtrees,
    /// one per direct child, in order.
    pub(crate) fn attach_runs(
        &mut self,
        parent: NodeId,
        nodes: Vec<ValueNode>,
    ) -> Result<(), EditError> {
        let mut runs: Vec<Vec<ValueNode>> = Vec::new();
        for node in nodes {
            match runs.last_mut() {
                Some(run) if node.parent() != Some(parent) => run.push(node),
                _ => runs.push(vec![node]),
            }
        }
        for run in runs {
            let position = self.tree.children(parent).len();
            self.tree.attach_subtree(parent, position, run)?;
        }
        Ok(())
    }
}

pub(crate) fn unreachable_slot() -> EditError {
    EditError::Structural("container is no longer reachable from the root".to_string())
}

/// Stores `value` at `path` under `root`. A record member missing from the
/// blob is added.
pub(crate) fn store(root: &mut Value, path: &[Step], value: Value) -> Result<(), EditError> {
    if let Some(slot) = root.at_path_mut(path) {
        *slot = value;
        return Ok(());
    }
    match path.split_last() {
        Some((Step::Field(name), parent)) => match root.at_path_mut(parent) {
            Some(Value::Record(record)) => {
                record.fields.insert(name.clone(), value);
                Ok(())
            }
            _ => Err(unreachable_slot()),
        },
        _ => Err(unreachable_slot()),
    }
}

/// True when a set crossed by `path` holds two equal members.
fn has_duplicated_set_along(root: &Value, path: &[Step]) -> bool {
    path.iter().enumerate().any(|(depth, step)| {
        if !matches!(step, Step::Member(_)) {
            return false;
        }
        let Some(Value::Set(items)) = root.at_path(&path[..depth]) else {
            return false;
        };
        items
            .iter()
            .enumerate()
            .any(|(i, item)| items[i + 1..].contains(item))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::schema::{RecordDesc, ScalarKind, TypeDesc};
    use crate::document::value::{MapKey, Record};
    use indexmap::IndexMap;

    fn sample() -> EditorState {
        let registry = TypeRegistry::new()
            .with(
                RecordDesc::structure("Vec2")
                    .field("x", TypeDesc::scalar(ScalarKind::F32))
                    .field("y", TypeDesc::scalar(ScalarKind::F32)),
            )
            .with(
                RecordDesc::class("Player")
                    .field("position", TypeDesc::record("Vec2"))
                    .field("tags", TypeDesc::set(TypeDesc::scalar(ScalarKind::Text)))
                    .field(
                        "wallet",
                        TypeDesc::map(ScalarKind::Text, TypeDesc::scalar(ScalarKind::I64)),
                    ),
            );
        let mut wallet = IndexMap::new();
        wallet.insert(MapKey::Text("gold".to_string()), Value::Int(5));
        let root = Value::Record(
            Record::new("Player")
                .with_field(
                    "position",
                    Value::Record(
                        Record::new("Vec2")
                            .with_field("x", Value::Float(1.0))
                            .with_field("y", Value::Float(2.0)),
                    ),
                )
                .with_field(
                    "tags",
                    Value::Set(vec![
                        Value::Text("brave".to_string()),
                        Value::Text("quick".to_string()),
                    ]),
                )
                .with_field("wallet", Value::Map(wallet)),
        );
        EditorState::new(SaveBlob::new(registry, TypeDesc::record("Player"), root), 1000).unwrap()
    }

    #[test]
    fn test_find_by_path_and_path_of() {
        let state = sample();
        let y = state.find_by_path("position/y").unwrap();
        assert_eq!(state.node(y).unwrap().current_value(), &Value::Float(2.0));
        assert_eq!(state.path_of(y), "position/y");
        assert_eq!(state.find_by_path(""), Some(state.root_id()));
        assert_eq!(state.find_by_path("position/z"), None);
    }

    #[test]
    fn test_steps_to_uses_owning_slots() {
        let state = sample();
        let quick = state.find_by_path("tags/quick").unwrap();
        assert_eq!(
            state.steps_to(quick).unwrap(),
            vec![Step::Field("tags".to_string()), Step::Member(1)]
        );
        let gold = state.find_by_path("wallet/gold").unwrap();
        let (parent, own) = state.locate(gold).unwrap();
        assert_eq!(parent, vec![Step::Field("wallet".to_string())]);
        assert_eq!(own, Step::Entry(MapKey::Text("gold".to_string())));
        assert!(state.locate(state.root_id()).is_err());
    }

    #[test]
    fn test_every_node_mirrors_the_graph() {
        let state = sample();
        for node in state.tree().iter() {
            let steps = state.steps_to(node.id()).unwrap();
            assert_eq!(state.blob().root.at_path(&steps), Some(node.current_value()));
        }
    }

    #[test]
    fn test_fresh_state_is_clean() {
        let state = sample();
        assert!(!state.is_dirty());
        assert!(!state.is_truncated());
        assert_eq!(state.tree().len(), 9);
    }
}
