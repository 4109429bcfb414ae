//! Value nodes: tree elements that wrap one slot of the live object graph.
//!
//! A `ValueNode` remembers the value it was loaded with (`pristine_value`)
//! next to the value the graph currently holds (`current_value`), so dirty
//! tracking is a comparison rather than a flag that can drift. What a node is
//! allowed to do is decided by its [`Binding`], the way it sits in its parent
//! container:
//!
//! | Binding   | Writable | Removable | Renamable |
//! |-----------|----------|-----------|-----------|
//! | `Root`    | no       | no        | no        |
//! | `Element` | yes      | yes       | no        |
//! | `Entry`   | yes      | yes       | yes       |
//! | `Member`  | yes      | yes       | no        |
//! | `Field`   | yes      | no        | no        |
//!
//! Growable containers additionally carry an [`Extender`].
//!
//! # Example
//!
//! ```
//! use savequill::document::node::{Binding, Slot, ValueNode};
//! use savequill::document::schema::{ScalarKind, TypeDesc};
//! use savequill::document::tree::TreeElement;
//! use savequill::document::value::Value;
//!
//! let mut node = ValueNode::new(
//!     TreeElement::new(1, Some(0), 0, "0"),
//!     TypeDesc::scalar(ScalarKind::I32),
//!     Value::Int(10),
//!     Slot::Index(0),
//!     Binding::Element,
//!     None,
//! );
//! assert!(!node.is_dirty());
//!
//! node.set_current_value(Value::Int(11));
//! assert!(node.is_dirty());
//! ```

use super::schema::{ScalarKind, TypeDesc, TypeRegistry};
use super::tree::{TreeElement, TreeItem};
use super::value::{MapKey, Step, Value};
use crate::error::EditError;
use std::fmt;

/// Where a node sits in its parent container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Root,
    /// Position in an array or list
    Index(usize),
    /// Key in a keyed map
    Entry(MapKey),
    /// Set element, identified by the fingerprint of its value
    Member(u64),
    /// Record member name
    Field(String),
}

impl Slot {
    /// The editable key of the slot. Only positions and map keys are keys;
    /// member names and set fingerprints are fixed.
    pub fn current_key(&self) -> Option<KeyRef<'_>> {
        match self {
            Slot::Index(i) => Some(KeyRef::Index(*i)),
            Slot::Entry(key) => Some(KeyRef::Entry(key)),
            _ => None,
        }
    }
}

/// Borrowed view of a first-class key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRef<'a> {
    Index(usize),
    Entry(&'a MapKey),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Root => f.write_str("Root"),
            Slot::Index(i) => write!(f, "{}", i),
            Slot::Entry(key) => write!(f, "{}", key),
            Slot::Member(hash) => write!(f, "#{:016x}", hash),
            Slot::Field(name) => f.write_str(name),
        }
    }
}

/// Stores a new value in a slot of its parent container.
pub trait Writable {
    /// Returns the value that was replaced.
    fn write_value(&self, container: &mut Value, step: &Step, new: Value)
        -> Result<Value, EditError>;
}

/// Removes a slot from its parent container.
pub trait Removable {
    /// `value` is the node's current value; sets remove by it.
    fn detach(&self, container: &mut Value, step: &Step, value: &Value)
        -> Result<Value, EditError>;
}

/// Moves a keyed slot to a new key.
pub trait Renamable {
    /// Returns the value of a sibling that was overwritten by the rename.
    fn write_key(
        &self,
        container: &mut Value,
        old: &MapKey,
        new: MapKey,
    ) -> Result<Option<Value>, EditError>;
}

/// Inserts a default-constructed element into a container.
pub trait Extendable {
    /// Returns a copy of the inserted element.
    fn insert_into(&self, container: &mut Value, registry: &TypeRegistry)
        -> Result<Value, EditError>;
}

fn mismatch(expected: &str) -> EditError {
    EditError::Structural(format!("parent is not a {} container", expected))
}

fn missing(step: &Step) -> EditError {
    EditError::Structural(format!("slot {:?} no longer exists", step))
}

/// Array and list elements.
#[derive(Debug, Clone, Copy)]
pub struct SequenceElement;

impl Writable for SequenceElement {
    fn write_value(
        &self,
        container: &mut Value,
        step: &Step,
        new: Value,
    ) -> Result<Value, EditError> {
        let (Value::Seq(items), Step::Index(index)) = (&mut *container, step) else {
            return Err(mismatch("sequence"));
        };
        let slot = items.get_mut(*index).ok_or_else(|| missing(step))?;
        Ok(std::mem::replace(slot, new))
    }
}

impl Removable for SequenceElement {
    fn detach(
        &self,
        container: &mut Value,
        step: &Step,
        _value: &Value,
    ) -> Result<Value, EditError> {
        let (Value::Seq(items), Step::Index(index)) = (&mut *container, step) else {
            return Err(mismatch("sequence"));
        };
        if *index >= items.len() {
            return Err(missing(step));
        }
        Ok(items.remove(*index))
    }
}

/// Values of a keyed map.
#[derive(Debug, Clone, Copy)]
pub struct MapEntry;

impl Writable for MapEntry {
    fn write_value(
        &self,
        container: &mut Value,
        step: &Step,
        new: Value,
    ) -> Result<Value, EditError> {
        let (Value::Map(entries), Step::Entry(key)) = (&mut *container, step) else {
            return Err(mismatch("map"));
        };
        let slot = entries.get_mut(key).ok_or_else(|| missing(step))?;
        Ok(std::mem::replace(slot, new))
    }
}

impl Removable for MapEntry {
    fn detach(
        &self,
        container: &mut Value,
        step: &Step,
        _value: &Value,
    ) -> Result<Value, EditError> {
        let (Value::Map(entries), Step::Entry(key)) = (&mut *container, step) else {
            return Err(mismatch("map"));
        };
        entries.shift_remove(key).ok_or_else(|| missing(step))
    }
}

impl Renamable for MapEntry {
    // A rename onto an existing key overwrites that entry.
    fn write_key(
        &self,
        container: &mut Value,
        old: &MapKey,
        new: MapKey,
    ) -> Result<Option<Value>, EditError> {
        let Value::Map(entries) = container else {
            return Err(mismatch("map"));
        };
        if !entries.contains_key(old) {
            return Err(EditError::Structural(format!("key '{}' no longer exists", old)));
        }
        if *old == new {
            return Ok(None);
        }

        let clobbered = entries.shift_remove(&new);
        let Some((index, _, value)) = entries.shift_remove_full(old) else {
            return Err(EditError::Structural(format!("key '{}' no longer exists", old)));
        };
        entries.shift_insert(index, new, value);
        Ok(clobbered)
    }
}

/// Elements of an unordered set.
#[derive(Debug, Clone, Copy)]
pub struct SetMember;

impl Writable for SetMember {
    // Replaces in place; refuses a value that would duplicate another element.
    fn write_value(
        &self,
        container: &mut Value,
        step: &Step,
        new: Value,
    ) -> Result<Value, EditError> {
        let (Value::Set(items), Step::Member(position)) = (&mut *container, step) else {
            return Err(mismatch("set"));
        };
        if *position >= items.len() {
            return Err(missing(step));
        }
        let duplicate = items
            .iter()
            .enumerate()
            .any(|(i, item)| i != *position && *item == new);
        if duplicate {
            return Err(EditError::Structural(format!(
                "set already contains {}",
                new.preview()
            )));
        }
        Ok(std::mem::replace(&mut items[*position], new))
    }
}

impl Removable for SetMember {
    fn detach(
        &self,
        container: &mut Value,
        _step: &Step,
        value: &Value,
    ) -> Result<Value, EditError> {
        let Value::Set(items) = container else {
            return Err(mismatch("set"));
        };
        let position = items
            .iter()
            .position(|item| item == value)
            .ok_or_else(|| {
                EditError::Structural(format!("set no longer contains {}", value.preview()))
            })?;
        Ok(items.remove(position))
    }
}

/// Members of a record.
#[derive(Debug, Clone, Copy)]
pub struct RecordField;

impl Writable for RecordField {
    fn write_value(
        &self,
        container: &mut Value,
        step: &Step,
        new: Value,
    ) -> Result<Value, EditError> {
        let (Value::Record(record), Step::Field(name)) = (&mut *container, step) else {
            return Err(mismatch("record"));
        };
        // members absent from the blob read as null and are created on write
        Ok(record.fields.insert(name.clone(), new).unwrap_or_default())
    }
}

/// How a node is bound to its parent container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Root,
    Element,
    Entry,
    Member,
    Field,
}

impl Binding {
    pub fn writable(self) -> Option<&'static dyn Writable> {
        match self {
            Binding::Root => None,
            Binding::Element => Some(&SequenceElement),
            Binding::Entry => Some(&MapEntry),
            Binding::Member => Some(&SetMember),
            Binding::Field => Some(&RecordField),
        }
    }

    pub fn removable(self) -> Option<&'static dyn Removable> {
        match self {
            Binding::Element => Some(&SequenceElement),
            Binding::Entry => Some(&MapEntry),
            Binding::Member => Some(&SetMember),
            Binding::Root | Binding::Field => None,
        }
    }

    pub fn renamable(self) -> Option<&'static dyn Renamable> {
        match self {
            Binding::Entry => Some(&MapEntry),
            _ => None,
        }
    }

    /// Siblings are keyed by position and must be renumbered after a removal.
    pub fn renumbers_siblings(self) -> bool {
        self == Binding::Element
    }
}

/// Inserts default elements into growable containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extender {
    Sequence(TypeDesc),
    Map { key: ScalarKind, value: TypeDesc },
    Set(TypeDesc),
}

impl Extendable for Extender {
    fn insert_into(
        &self,
        container: &mut Value,
        registry: &TypeRegistry,
    ) -> Result<Value, EditError> {
        match (self, container) {
            (Extender::Sequence(element), Value::Seq(items)) => {
                let fresh = registry.default_instance(element)?;
                items.push(fresh.clone());
                Ok(fresh)
            }
            (Extender::Map { key, value }, Value::Map(entries)) => {
                let default_key = MapKey::from_value(&key.zero())
                    .ok_or_else(|| crate::error::TypeError::UnsupportedKey(key.label()))?;
                if entries.contains_key(&default_key) {
                    return Err(EditError::Structural(format!(
                        "map already has an entry for the default key '{}'",
                        default_key
                    )));
                }
                let fresh = registry.default_instance(value)?;
                entries.insert(default_key, fresh.clone());
                Ok(fresh)
            }
            (Extender::Set(element), Value::Set(items)) => {
                let fresh = registry.default_instance(element)?;
                if items.contains(&fresh) {
                    return Err(EditError::Structural(format!(
                        "set already contains the default element {}",
                        fresh.preview()
                    )));
                }
                items.push(fresh.clone());
                Ok(fresh)
            }
            _ => Err(mismatch("growable")),
        }
    }
}

/// One editable slot of the live graph, as a tree element.
#[derive(Debug, Clone)]
pub struct ValueNode {
    element: TreeElement,
    declared_type: TypeDesc,
    current_value: Value,
    pristine_value: Value,
    edit_buffer: Option<String>,
    is_valid: bool,
    key: Slot,
    pristine_key: Slot,
    key_buffer: Option<String>,
    key_valid: bool,
    binding: Binding,
    extender: Option<Extender>,
}

impl ValueNode {
    pub fn new(
        element: TreeElement,
        declared_type: TypeDesc,
        value: Value,
        key: Slot,
        binding: Binding,
        extender: Option<Extender>,
    ) -> Self {
        Self {
            element,
            declared_type,
            pristine_value: value.clone(),
            current_value: value,
            edit_buffer: None,
            is_valid: true,
            pristine_key: key.clone(),
            key,
            key_buffer: None,
            key_valid: true,
            binding,
            extender,
        }
    }

    pub fn declared_type(&self) -> &TypeDesc {
        &self.declared_type
    }

    pub fn current_value(&self) -> &Value {
        &self.current_value
    }

    pub fn pristine_value(&self) -> &Value {
        &self.pristine_value
    }

    pub fn key(&self) -> &Slot {
        &self.key
    }

    pub fn pristine_key(&self) -> &Slot {
        &self.pristine_key
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    pub fn extender(&self) -> Option<&Extender> {
        self.extender.as_ref()
    }

    pub fn edit_buffer(&self) -> Option<&str> {
        self.edit_buffer.as_deref()
    }

    pub fn key_buffer(&self) -> Option<&str> {
        self.key_buffer.as_deref()
    }

    pub fn current_key(&self) -> Option<KeyRef<'_>> {
        self.key.current_key()
    }

    /// The value differs from what was loaded (or last saved), or the node
    /// has moved to a different key.
    pub fn is_dirty(&self) -> bool {
        self.current_value != self.pristine_value || self.key != self.pristine_key
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn is_key_valid(&self) -> bool {
        self.key_valid
    }

    pub fn can_add(&self) -> bool {
        self.extender.is_some()
    }

    pub fn can_remove(&self) -> bool {
        self.binding.removable().is_some()
    }

    pub fn can_rename(&self) -> bool {
        self.binding.renamable().is_some()
    }

    pub fn can_write(&self) -> bool {
        self.binding.writable().is_some()
    }

    /// The scalar kind of the declared type, for nodes edited as text.
    pub fn scalar_kind(&self) -> Option<&ScalarKind> {
        match &self.declared_type {
            TypeDesc::Scalar(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn set_current_value(&mut self, value: Value) {
        self.current_value = value;
    }

    pub(crate) fn set_edit_buffer(&mut self, text: Option<String>, valid: bool) {
        self.edit_buffer = text;
        self.is_valid = valid;
    }

    pub(crate) fn set_key_buffer(&mut self, text: Option<String>, valid: bool) {
        self.key_buffer = text;
        self.key_valid = valid;
    }

    /// Moves the node to a new slot and renames it to match.
    pub(crate) fn set_key(&mut self, key: Slot) {
        self.element.set_name(key.to_string());
        self.key = key;
    }

    /// Makes the current value and key the new baseline.
    pub(crate) fn rebaseline(&mut self) {
        self.pristine_value = self.current_value.clone();
        self.pristine_key = self.key.clone();
    }
}

impl TreeItem for ValueNode {
    fn element(&self) -> &TreeElement {
        &self.element
    }

    fn element_mut(&mut self) -> &mut TreeElement {
        &mut self.element
    }
}
