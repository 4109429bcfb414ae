//! Turns the live object graph into tree nodes.
//!
//! The walker dispatches on the [`Shape`] of each slot's declared type, not
//! on the runtime value, so a null list still gets an add control and an
//! abstract member never gets expanded. Nodes are emitted in pre-order.
//!
//! A walk stops producing nodes once the configured ceiling is reached. The
//! owned graph cannot contain cycles, but a save with millions of elements
//! would otherwise build a tree nobody can browse.
//!
//! # Example
//!
//! ```
//! use savequill::document::schema::{ScalarKind, TypeDesc, TypeRegistry};
//! use savequill::document::tree::IdAllocator;
//! use savequill::document::value::Value;
//! use savequill::document::walker::GraphWalker;
//!
//! let registry = TypeRegistry::new();
//! let mut ids = IdAllocator::new();
//! let root = Value::Seq(vec![Value::Int(10), Value::Int(20)]);
//! let ty = TypeDesc::list(TypeDesc::scalar(ScalarKind::I32));
//!
//! let (nodes, report) = GraphWalker::new(&registry, &mut ids, 100).walk_root(&root, &ty);
//! assert_eq!(nodes.len(), 3);
//! assert!(!report.truncated);
//! ```

use super::node::{Binding, Extender, Slot, ValueNode};
use super::schema::{RecordDesc, Shape, TypeDesc, TypeRegistry};
use super::tree::{IdAllocator, NodeId, TreeElement};
use super::value::Value;

/// Summary of a finished walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalkReport {
    /// Nodes produced, including the root of the walk
    pub nodes: usize,
    /// The ceiling was hit and some of the graph has no nodes
    pub truncated: bool,
}

pub struct GraphWalker<'a> {
    registry: &'a TypeRegistry,
    ids: &'a mut IdAllocator,
    ceiling: usize,
    produced: usize,
    truncated: bool,
}

impl<'a> GraphWalker<'a> {
    pub fn new(registry: &'a TypeRegistry, ids: &'a mut IdAllocator, ceiling: usize) -> Self {
        Self {
            registry,
            ids,
            ceiling,
            produced: 0,
            truncated: false,
        }
    }

    /// Walks a whole save, producing the root node followed by everything
    /// under it.
    pub fn walk_root(mut self, root: &Value, ty: &TypeDesc) -> (Vec<ValueNode>, WalkReport) {
        let mut sink = Vec::new();
        if self.reserve() {
            let id = self.ids.next_id();
            let element = TreeElement::new(id, None, -1, Slot::Root.to_string());
            sink.push(ValueNode::new(
                element,
                ty.clone(),
                root.clone(),
                Slot::Root,
                Binding::Root,
                self.extender_for(ty),
            ));
            self.walk_children(id, -1, root, ty, &mut sink);
        }
        (sink, self.finish())
    }

    /// Emits a node for `value` under `parent`, then its descendants.
    #[allow(clippy::too_many_arguments)]
    pub fn walk(
        &mut self,
        parent: NodeId,
        parent_depth: i32,
        slot: Slot,
        binding: Binding,
        value: &Value,
        ty: &TypeDesc,
        sink: &mut Vec<ValueNode>,
    ) {
        if !self.reserve() {
            return;
        }

        let id = self.ids.next_id();
        let depth = parent_depth + 1;
        // set members have no key worth showing, so they go by their value
        let name = if binding == Binding::Member {
            value.preview()
        } else {
            slot.to_string()
        };
        sink.push(ValueNode::new(
            TreeElement::new(id, Some(parent), depth, name),
            ty.clone(),
            value.clone(),
            slot,
            binding,
            self.extender_for(ty),
        ));
        self.walk_children(id, depth, value, ty, sink);
    }

    /// Emits the descendants of a container node that is already in the tree
    /// (or about to be) as `parent`.
    pub fn walk_children(
        &mut self,
        parent: NodeId,
        parent_depth: i32,
        value: &Value,
        ty: &TypeDesc,
        sink: &mut Vec<ValueNode>,
    ) {
        if value.is_null() {
            return;
        }

        let registry = self.registry;
        match (registry.classify(ty), value) {
            (Shape::Scalar(_) | Shape::Opaque, _) => {}
            (Shape::FixedSequence(element) | Shape::GrowableSequence(element), Value::Seq(items)) => {
                for (index, item) in items.iter().enumerate() {
                    self.walk(
                        parent,
                        parent_depth,
                        Slot::Index(index),
                        Binding::Element,
                        item,
                        element,
                        sink,
                    );
                }
            }
            (Shape::KeyedMap { value: element, .. }, Value::Map(entries)) => {
                for (key, item) in entries {
                    self.walk(
                        parent,
                        parent_depth,
                        Slot::Entry(key.clone()),
                        Binding::Entry,
                        item,
                        element,
                        sink,
                    );
                }
            }
            (Shape::UnorderedSet(element), Value::Set(items)) => {
                for item in items {
                    self.walk(
                        parent,
                        parent_depth,
                        Slot::Member(item.fingerprint()),
                        Binding::Member,
                        item,
                        element,
                        sink,
                    );
                }
            }
            (Shape::Record(declared), Value::Record(record)) => {
                // members come from the runtime type when the registry knows it
                let desc: &RecordDesc = match registry.record(&record.type_name) {
                    Some(runtime) if !runtime.is_abstract => runtime,
                    _ => declared,
                };
                for member in registry.editable_members(desc) {
                    let item = record.fields.get(&member.name).unwrap_or(&Value::Null);
                    self.walk(
                        parent,
                        parent_depth,
                        Slot::Field(member.name.clone()),
                        Binding::Field,
                        item,
                        &member.ty,
                        sink,
                    );
                }
            }
            (_, other) => {
                tracing::warn!(
                    "value {} does not match declared type {}, not expanding",
                    other.preview(),
                    registry.type_label(ty)
                );
            }
        }
    }

    pub fn finish(self) -> WalkReport {
        WalkReport {
            nodes: self.produced,
            truncated: self.truncated,
        }
    }

    /// Counts one more node against the ceiling.
    fn reserve(&mut self) -> bool {
        if self.produced >= self.ceiling {
            if !self.truncated {
                tracing::error!(
                    "node ceiling of {} reached, the rest of the save is not shown",
                    self.ceiling
                );
                self.truncated = true;
            }
            return false;
        }
        self.produced += 1;
        true
    }

    fn extender_for(&self, ty: &TypeDesc) -> Option<Extender> {
        match self.registry.classify(ty) {
            Shape::GrowableSequence(element) => Some(Extender::Sequence(element.clone())),
            Shape::KeyedMap { key, value } => Some(Extender::Map {
                key: key.clone(),
                value: value.clone(),
            }),
            Shape::UnorderedSet(element) => Some(Extender::Set(element.clone())),
            _ => None,
        }
    }
}
