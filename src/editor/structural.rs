//! Adding and removing collection elements.
//!
//! Both operations keep the tree and the live graph in step. Removal detaches
//! the element from its parent container, then drops the node with all of its
//! descendants and renumbers positional siblings. Adding is transactional:
//! the element is inserted into a copy of the container, the copy is walked,
//! and only once the new nodes are known to be sound is the copy committed
//! to the graph and the new subtree attached.

use super::state::{store, unreachable_slot, EditorState};
use crate::document::node::{Extendable, Extender};
use crate::document::tree::{NodeId, TreeItem};
use crate::document::walker::GraphWalker;
use crate::error::EditError;
use tracing::debug;

impl EditorState {
    /// Removes a collection element from the graph and the tree.
    pub fn remove_element(&mut self, id: NodeId) -> Result<(), EditError> {
        let node = self.node(id)?;
        let binding = node.binding();
        let remover = binding.removable().ok_or(EditError::Unsupported {
            id,
            operation: "remove",
        })?;
        let value = node.current_value().clone();
        let parent = node.parent().ok_or(EditError::UnknownNode(id))?;

        let (parent_path, step) = self.locate(id)?;
        self.check_set_members(&parent_path, |root| {
            let container = root.at_path_mut(&parent_path).ok_or_else(unreachable_slot)?;
            remover.detach(container, &step, &value).map(|_| ())
        })?;
        let container = self.container_mut(&parent_path)?;
        remover.detach(container, &step, &value)?;

        let removed = self.tree.remove(id)?;
        debug!(
            "removed node {} and {} descendants",
            id,
            removed.len().saturating_sub(1)
        );

        if binding.renumbers_siblings() {
            self.renumber_children(parent);
        }
        self.refresh_from(parent);
        Ok(())
    }

    /// Appends a default-constructed element to a growable container and
    /// returns the id of its node.
    ///
    /// A null container is replaced by an empty one holding the new element.
    /// Nothing changes when the add fails.
    pub fn add_element(&mut self, id: NodeId) -> Result<NodeId, EditError> {
        let node = self.node(id)?;
        let extender = node.extender().cloned().ok_or(EditError::Unsupported {
            id,
            operation: "add",
        })?;
        let ty = node.declared_type().clone();
        let depth = node.depth();
        let was_null = node.current_value().is_null();
        let snapshot = self.tree.descendants(id).len();

        let path = self.steps_to(id)?;
        let mut working = if was_null {
            self.blob.types.default_instance(&ty)?
        } else {
            self.blob.root.at_path(&path).cloned().ok_or_else(unreachable_slot)?
        };
        extender.insert_into(&mut working, &self.blob.types)?;
        self.check_set_members(&path, |root| store(root, &path, working.clone()))?;

        let mut scratch = Vec::new();
        let mut walker = GraphWalker::new(&self.blob.types, &mut self.ids, self.max_nodes);
        walker.walk_children(id, depth, &working, &ty, &mut scratch);
        let report = walker.finish();

        if report.truncated {
            return Err(EditError::Structural(
                "node ceiling reached while building the new element".to_string(),
            ));
        }
        if scratch.len() <= snapshot {
            return Err(EditError::Structural(format!(
                "container produced {} nodes after insert, expected more than {}",
                scratch.len(),
                snapshot
            )));
        }
        let fresh = scratch.split_off(snapshot);
        let new_id = fresh[0].id();
        if fresh[0].parent() != Some(id) {
            return Err(EditError::Structural(
                "new element did not come out as the last child".to_string(),
            ));
        }

        let position = self.tree.children(id).len();
        self.tree.attach_subtree(id, position, fresh)?;
        if let Err(err) = store(&mut self.blob.root, &path, working) {
            let _ = self.tree.remove(new_id);
            return Err(err);
        }

        if matches!(extender, Extender::Sequence(_)) {
            self.renumber_children(id);
        }
        self.refresh_from(id);
        debug!("added node {} under {}", new_id, id);
        Ok(new_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::node::Slot;
    use crate::document::schema::{RecordDesc, ScalarKind, TypeDesc, TypeRegistry};
    use crate::document::value::{MapKey, Record, Value};
    use crate::document::SaveBlob;
    use indexmap::IndexMap;

    fn i32_ty() -> TypeDesc {
        TypeDesc::scalar(ScalarKind::I32)
    }

    fn list_state(items: &[i64]) -> EditorState {
        let blob = SaveBlob::new(
            TypeRegistry::new(),
            TypeDesc::list(i32_ty()),
            Value::Seq(items.iter().map(|&i| Value::Int(i)).collect()),
        );
        EditorState::new(blob, 1000).unwrap()
    }

    #[test]
    fn test_add_to_list() {
        let mut state = list_state(&[10, 20]);
        let root = state.root_id();
        let added = state.add_element(root).unwrap();

        assert_eq!(
            state.blob().root,
            Value::Seq(vec![Value::Int(10), Value::Int(20), Value::Int(0)])
        );
        let node = state.node(added).unwrap();
        assert_eq!(node.key(), &Slot::Index(2));
        assert_eq!(node.name(), "2");
        assert_eq!(node.parent(), Some(root));
        assert_eq!(state.tree().children(root).len(), 3);
    }

    #[test]
    fn test_remove_renumbers() {
        let mut state = list_state(&[10, 20, 30]);
        let middle = state.find_by_path("1").unwrap();
        state.remove_element(middle).unwrap();

        assert_eq!(
            state.blob().root,
            Value::Seq(vec![Value::Int(10), Value::Int(30)])
        );
        let keys: Vec<Slot> = state
            .tree()
            .children(state.root_id())
            .iter()
            .map(|&c| state.node(c).unwrap().key().clone())
            .collect();
        assert_eq!(keys, vec![Slot::Index(0), Slot::Index(1)]);
        assert!(state.find_by_path("2").is_none());
        let last = state.find_by_path("1").unwrap();
        assert_eq!(state.node(last).unwrap().current_value(), &Value::Int(30));
    }

    #[test]
    fn test_add_record_element_builds_subtree() {
        let registry = TypeRegistry::new().with(
            RecordDesc::structure("Item")
                .field("name", TypeDesc::scalar(ScalarKind::Text))
                .field("count", i32_ty()),
        );
        let blob = SaveBlob::new(
            registry,
            TypeDesc::list(TypeDesc::record("Item")),
            Value::Seq(Vec::new()),
        );
        let mut state = EditorState::new(blob, 1000).unwrap();
        let root = state.root_id();

        let added = state.add_element(root).unwrap();
        assert_eq!(state.tree().descendants(added).len(), 2);
        let count = state.find_by_path("0/count").unwrap();
        state.edit_value(count, "3").unwrap();
        assert_eq!(
            state.blob().root,
            Value::Seq(vec![Value::Record(
                Record::new("Item")
                    .with_field("name", Value::Null)
                    .with_field("count", Value::Int(3))
            )])
        );
    }

    #[test]
    fn test_add_to_null_container_initialises_it() {
        let registry = TypeRegistry::new()
            .with(RecordDesc::class("Bag").field("items", TypeDesc::list(i32_ty())));
        let root = Value::Record(Record::new("Bag").with_field("items", Value::Null));
        let mut state =
            EditorState::new(SaveBlob::new(registry, TypeDesc::record("Bag"), root), 100).unwrap();

        let items = state.find_by_path("items").unwrap();
        state.add_element(items).unwrap();
        assert_eq!(
            state.node(items).unwrap().current_value(),
            &Value::Seq(vec![Value::Int(0)])
        );
    }

    #[test]
    fn test_failed_add_to_null_container_keeps_it_null() {
        let registry = TypeRegistry::new()
            .with(RecordDesc::abstract_class("Entity"))
            .with(RecordDesc::class("Bag").field("items", TypeDesc::list(TypeDesc::record("Entity"))));
        let root = Value::Record(Record::new("Bag").with_field("items", Value::Null));
        let mut state = EditorState::new(
            SaveBlob::new(registry, TypeDesc::record("Bag"), root.clone()),
            100,
        )
        .unwrap();
        let items = state.find_by_path("items").unwrap();

        assert!(matches!(state.add_element(items), Err(EditError::Type(_))));
        assert_eq!(state.blob().root, root);
        assert_eq!(state.node(items).unwrap().current_value(), &Value::Null);
        assert!(state.tree().children(items).is_empty());
        assert!(!state.is_dirty());
    }

    #[test]
    fn test_add_to_missing_record_member_creates_it() {
        let registry = TypeRegistry::new()
            .with(RecordDesc::class("Bag").field("items", TypeDesc::list(i32_ty())));
        let mut state = EditorState::new(
            SaveBlob::new(registry, TypeDesc::record("Bag"), Value::Record(Record::new("Bag"))),
            100,
        )
        .unwrap();
        let items = state.find_by_path("items").unwrap();

        state.add_element(items).unwrap();
        assert_eq!(
            state.blob().root,
            Value::Record(Record::new("Bag").with_field("items", Value::Seq(vec![Value::Int(0)])))
        );
    }

    #[test]
    fn test_map_default_key_collision_leaves_everything_untouched() {
        let mut entries = IndexMap::new();
        entries.insert(MapKey::Text(String::new()), Value::Int(1));
        let blob = SaveBlob::new(
            TypeRegistry::new(),
            TypeDesc::map(ScalarKind::Text, i32_ty()),
            Value::Map(entries.clone()),
        );
        let mut state = EditorState::new(blob, 100).unwrap();
        let root = state.root_id();

        assert!(matches!(
            state.add_element(root),
            Err(EditError::Structural(_))
        ));
        assert_eq!(state.blob().root, Value::Map(entries));
        assert_eq!(state.tree().len(), 2);
    }

    #[test]
    fn test_add_past_ceiling_fails_cleanly() {
        let blob = SaveBlob::new(
            TypeRegistry::new(),
            TypeDesc::list(i32_ty()),
            Value::Seq(vec![Value::Int(1), Value::Int(2)]),
        );
        let mut state = EditorState::new(blob, 2).unwrap();
        assert!(state.is_truncated());
        let root = state.root_id();

        assert!(matches!(
            state.add_element(root),
            Err(EditError::Structural(_))
        ));
        assert_eq!(state.blob().root.len(), 2);
        assert_eq!(state.tree().len(), 2);
    }

    #[test]
    fn test_set_add_and_remove() {
        let blob = SaveBlob::new(
            TypeRegistry::new(),
            TypeDesc::set(i32_ty()),
            Value::Set(vec![Value::Int(5)]),
        );
        let mut state = EditorState::new(blob, 100).unwrap();
        let root = state.root_id();

        let zero = state.add_element(root).unwrap();
        assert_eq!(state.node(zero).unwrap().name(), "0");
        assert_eq!(
            state.blob().root,
            Value::Set(vec![Value::Int(5), Value::Int(0)])
        );

        let five = state.find_by_path("5").unwrap();
        state.remove_element(five).unwrap();
        assert_eq!(state.blob().root, Value::Set(vec![Value::Int(0)]));

        // the remaining member is now at position 0 and still writable
        state.edit_value(zero, "7").unwrap();
        assert_eq!(state.blob().root, Value::Set(vec![Value::Int(7)]));
    }

    #[test]
    fn test_record_fields_cannot_be_removed() {
        let registry =
            TypeRegistry::new().with(RecordDesc::class("Bag").field("count", i32_ty()));
        let root = Value::Record(Record::new("Bag").with_field("count", Value::Int(1)));
        let mut state =
            EditorState::new(SaveBlob::new(registry, TypeDesc::record("Bag"), root), 100).unwrap();
        let count = state.find_by_path("count").unwrap();

        assert!(matches!(
            state.remove_element(count),
            Err(EditError::Unsupported { .. })
        ));
        assert!(matches!(
            state.remove_element(state.root_id()),
            Err(EditError::Unsupported { .. })
        ));
    }
}
