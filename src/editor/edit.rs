//! Value and key edits on a loaded save.
//!
//! Text typed by the operator goes into a node's edit buffer first. The
//! buffer is parsed as the node's declared scalar kind; while it does not
//! parse the node is flagged invalid and nothing reaches the graph. A valid
//! buffer is committed through the node's [`Writable`] binding, after which
//! the node and every ancestor re-read their values from the graph.
//!
//! Keys of map entries follow the same buffer/validity scheme.
//!
//! [`Writable`]: crate::document::node::Writable

use super::state::{unreachable_slot, EditorState};
use crate::document::node::{Binding, Slot};
use crate::document::schema::{ScalarKind, TypeDesc};
use crate::document::tree::{NodeId, TreeItem};
use crate::document::value::Value;
use crate::error::EditError;
use tracing::{debug, warn};

impl EditorState {
    /// Writes `value` into the node's slot of the live graph.
    ///
    /// The node's children are rebuilt from the new value and its ancestors
    /// are refreshed. A write below a set member that would leave the set
    /// with two equal members is refused.
    pub fn commit_value(&mut self, id: NodeId, value: Value) -> Result<(), EditError> {
        let node = self.node(id)?;
        let binding = node.binding();
        let parent = node.parent();
        let writer = binding.writable().ok_or(EditError::Unsupported {
            id,
            operation: "write",
        })?;

        let (parent_path, step) = self.locate(id)?;
        self.check_set_members(&parent_path, |root| {
            let container = root.at_path_mut(&parent_path).ok_or_else(unreachable_slot)?;
            writer.write_value(container, &step, value.clone()).map(|_| ())
        })?;
        let container = self.container_mut(&parent_path)?;
        writer.write_value(container, &step, value.clone())?;

        let node = self.node_mut(id)?;
        if binding == Binding::Member {
            node.set_key(Slot::Member(value.fingerprint()));
            node.element_mut().set_name(value.preview());
        }
        debug!("node {} set to {}", id, value.preview());
        node.set_current_value(value);

        self.regenerate_children(id)?;
        if let Some(parent) = parent {
            self.refresh_from(parent);
        }
        Ok(())
    }

    /// Stores operator text for a scalar node and checks that it parses.
    ///
    /// Returns [`EditError::InvalidEdit`] when it does not; the text is kept
    /// and the node is flagged invalid either way.
    pub fn set_edit_buffer(&mut self, id: NodeId, text: &str) -> Result<(), EditError> {
        let kind = self.scalar_kind(id)?;
        let parsed = kind.parse(text);
        let valid = parsed.is_ok();
        self.node_mut(id)?
            .set_edit_buffer(Some(text.to_string()), valid);
        parsed
            .map(|_| ())
            .map_err(|source| EditError::InvalidEdit { id, source })
    }

    /// Commits a node's edit buffer. Returns false when there was nothing to
    /// commit.
    pub fn commit_edit(&mut self, id: NodeId) -> Result<bool, EditError> {
        let Some(text) = self.node(id)?.edit_buffer().map(str::to_string) else {
            return Ok(false);
        };
        let kind = self.scalar_kind(id)?;
        let value = match kind.parse(&text) {
            Ok(value) => value,
            Err(source) => {
                self.node_mut(id)?.set_edit_buffer(Some(text), false);
                return Err(EditError::InvalidEdit { id, source });
            }
        };

        self.commit_value(id, value)?;
        self.node_mut(id)?.set_edit_buffer(None, true);
        Ok(true)
    }

    /// Parses and commits operator text in one go.
    pub fn edit_value(&mut self, id: NodeId, text: &str) -> Result<(), EditError> {
        self.set_edit_buffer(id, text)?;
        self.commit_edit(id).map(|_| ())
    }

    /// Throws away an uncommitted buffer; the node is valid again.
    pub fn cancel_edit(&mut self, id: NodeId) -> Result<(), EditError> {
        self.node_mut(id)?.set_edit_buffer(None, true);
        Ok(())
    }

    /// Stores operator text for a map key and checks that it parses as the
    /// map's key kind.
    pub fn set_key_buffer(&mut self, id: NodeId, text: &str) -> Result<(), EditError> {
        let kind = self.key_kind(id)?;
        let parsed = kind.parse_key(text);
        let valid = parsed.is_ok();
        self.node_mut(id)?.set_key_buffer(Some(text.to_string()), valid);
        parsed
            .map(|_| ())
            .map_err(|source| EditError::InvalidEdit { id, source })
    }

    /// Moves a map entry to a new key, keeping its position.
    ///
    /// Renaming onto a key that already exists overwrites that entry; its
    /// node is dropped from the tree.
    pub fn rename_key(&mut self, id: NodeId, text: &str) -> Result<(), EditError> {
        let node = self.node(id)?;
        let renamer = node.binding().renamable().ok_or(EditError::Unsupported {
            id,
            operation: "rename",
        })?;
        let Slot::Entry(old) = node.key().clone() else {
            return Err(EditError::Unsupported {
                id,
                operation: "rename",
            });
        };
        let parent = node.parent().ok_or(EditError::UnknownNode(id))?;

        let kind = self.key_kind(id)?;
        let new = match kind.parse_key(text) {
            Ok(key) => key,
            Err(source) => {
                self.node_mut(id)?
                    .set_key_buffer(Some(text.to_string()), false);
                return Err(EditError::InvalidEdit { id, source });
            }
        };

        if new != old {
            let (parent_path, _) = self.locate(id)?;
            self.check_set_members(&parent_path, |root| {
                let container = root.at_path_mut(&parent_path).ok_or_else(unreachable_slot)?;
                renamer.write_key(container, &old, new.clone()).map(|_| ())
            })?;
            let container = self.container_mut(&parent_path)?;
            let clobbered = renamer.write_key(container, &old, new.clone())?;

            if clobbered.is_some() {
                let sibling = self.tree.children(parent).iter().copied().find(|&c| {
                    c != id && self.tree.get(c).is_some_and(|n| n.key() == &Slot::Entry(new.clone()))
                });
                if let Some(sibling) = sibling {
                    warn!("renaming '{}' to '{}' overwrote an existing entry", old, new);
                    self.tree.remove(sibling)?;
                }
            }
            debug!("node {} renamed from '{}' to '{}'", id, old, new);
            self.node_mut(id)?.set_key(Slot::Entry(new));
            self.refresh_from(parent);
        }

        self.node_mut(id)?.set_key_buffer(None, true);
        Ok(())
    }

    /// Replaces a node's value with the zero value of its declared type:
    /// null for reference types, a default instance for value types.
    pub fn reset_to_default(&mut self, id: NodeId) -> Result<(), EditError> {
        let ty = self.node(id)?.declared_type().clone();
        let zero = self.blob.types.zero_value(&ty)?;
        self.commit_value(id, zero)
    }

    fn scalar_kind(&self, id: NodeId) -> Result<ScalarKind, EditError> {
        self.node(id)?
            .scalar_kind()
            .cloned()
            .ok_or(EditError::Unsupported {
                id,
                operation: "text edit",
            })
    }

    fn key_kind(&self, id: NodeId) -> Result<ScalarKind, EditError> {
        let parent = self.node(id)?.parent().ok_or(EditError::Unsupported {
            id,
            operation: "rename",
        })?;
        match self.node(parent)?.declared_type() {
            TypeDesc::Map { key, .. } => Ok(key.clone()),
            _ => Err(EditError::Unsupported {
                id,
                operation: "rename",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::schema::{RecordDesc, TypeRegistry};
    use crate::document::value::{MapKey, Record, Step};
    use crate::document::SaveBlob;
    use crate::error::TypeError;
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
    fn test_invalid_buffer_is_not_committed() {
        let mut state = list_state(&[10, 20]);
        let first = state.find_by_path("0").unwrap();

        let err = state.set_edit_buffer(first, "ten").unwrap_err();
        assert!(matches!(err, EditError::InvalidEdit { .. }));
        assert!(!state.node(first).unwrap().is_valid());
        assert_eq!(state.node(first).unwrap().edit_buffer(), Some("ten"));
        assert!(state.commit_edit(first).is_err());
        assert_eq!(state.node(first).unwrap().current_value(), &Value::Int(10));
        assert_eq!(
            state.blob().root,
            Value::Seq(vec![Value::Int(10), Value::Int(20)])
        );

        state.cancel_edit(first).unwrap();
        assert!(state.node(first).unwrap().is_valid());
        assert_eq!(state.node(first).unwrap().edit_buffer(), None);
    }

    #[test]
    fn test_out_of_range_buffer_is_invalid() {
        let mut state = list_state(&[1]);
        let first = state.find_by_path("0").unwrap();
        let err = state.set_edit_buffer(first, "3000000000").unwrap_err();
        assert!(matches!(
            err,
            EditError::InvalidEdit {
                source: TypeError::Parse { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_commit_refreshes_ancestors() {
        let mut state = list_state(&[10, 20]);
        let second = state.find_by_path("1").unwrap();
        state.edit_value(second, "21").unwrap();

        let root = state.node(state.root_id()).unwrap();
        assert_eq!(
            root.current_value(),
            &Value::Seq(vec![Value::Int(10), Value::Int(21)])
        );
        assert!(root.is_dirty());
        assert!(state.node(second).unwrap().is_dirty());

        state.edit_value(second, "20").unwrap();
        assert!(!state.is_dirty());
    }

    #[test]
    fn test_struct_member_written_in_place() {
        let registry = TypeRegistry::new()
            .with(RecordDesc::structure("Vec2").field("x", TypeDesc::scalar(ScalarKind::F32)))
            .with(RecordDesc::structure("Transform").field("position", TypeDesc::record("Vec2")));
        let root = Value::Record(Record::new("Transform").with_field(
            "position",
            Value::Record(Record::new("Vec2").with_field("x", Value::Float(1.0))),
        ));
        let mut state =
            EditorState::new(SaveBlob::new(registry, TypeDesc::record("Transform"), root), 100)
                .unwrap();

        let x = state.find_by_path("position/x").unwrap();
        state.edit_value(x, "4.5").unwrap();
        let path = [Step::Field("position".to_string()), Step::Field("x".to_string())];
        assert_eq!(state.blob().root.at_path(&path), Some(&Value::Float(4.5)));
    }

    #[test]
    fn test_rename_key_and_collision() {
        let mut entries = IndexMap::new();
        entries.insert(MapKey::Text("a".to_string()), Value::Int(1));
        entries.insert(MapKey::Text("b".to_string()), Value::Int(2));
        let blob = SaveBlob::new(
            TypeRegistry::new(),
            TypeDesc::map(ScalarKind::Text, i32_ty()),
            Value::Map(entries),
        );
        let mut state = EditorState::new(blob, 100).unwrap();

        let a = state.find_by_path("a").unwrap();
        state.rename_key(a, "b").unwrap();

        let mut expected = IndexMap::new();
        expected.insert(MapKey::Text("b".to_string()), Value::Int(1));
        assert_eq!(state.blob().root, Value::Map(expected));
        assert_eq!(state.tree().children(state.root_id()), &[a]);
        assert_eq!(state.node(a).unwrap().name(), "b");
    }

    #[test]
    fn test_key_buffer_validation() {
        let mut entries = IndexMap::new();
        entries.insert(MapKey::Int(1), Value::Int(1));
        let blob = SaveBlob::new(
            TypeRegistry::new(),
            TypeDesc::map(ScalarKind::I32, i32_ty()),
            Value::Map(entries),
        );
        let mut state = EditorState::new(blob, 100).unwrap();
        let one = state.find_by_path("1").unwrap();

        assert!(state.set_key_buffer(one, "x").is_err());
        assert!(!state.node(one).unwrap().is_key_valid());
        assert!(state.rename_key(one, "x").is_err());
        state.set_key_buffer(one, "2").unwrap();
        assert!(state.node(one).unwrap().is_key_valid());
    }

    #[test]
    fn test_reset_to_default() {
        let registry = TypeRegistry::new().with(
            RecordDesc::class("Bag")
                .field("items", TypeDesc::list(i32_ty()))
                .field("count", i32_ty()),
        );
        let root = Value::Record(
            Record::new("Bag")
                .with_field("items", Value::Seq(vec![Value::Int(1)]))
                .with_field("count", Value::Int(9)),
        );
        let mut state =
            EditorState::new(SaveBlob::new(registry, TypeDesc::record("Bag"), root), 100).unwrap();

        let items = state.find_by_path("items").unwrap();
        state.reset_to_default(items).unwrap();
        assert_eq!(state.node(items).unwrap().current_value(), &Value::Null);
        assert!(state.tree().children(items).is_empty());

        let count = state.find_by_path("count").unwrap();
        state.reset_to_default(count).unwrap();
        assert_eq!(state.node(count).unwrap().current_value(), &Value::Int(0));
    }

    #[test]
    fn test_text_edit_on_container_is_unsupported() {
        let mut state = list_state(&[1]);
        let root = state.root_id();
        assert!(matches!(
            state.set_edit_buffer(root, "1"),
            Err(EditError::Unsupported { .. })
        ));
    }
}
