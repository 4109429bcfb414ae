//! The save document model.
//!
//! A save is a [`SaveBlob`]: the live object graph ([`value`]), the declared
//! type of its root and the type registry ([`schema`]) that describes every
//! record in it. The editor never edits the blob directly; it walks it
//! ([`walker`]) into a tree of [`node::ValueNode`]s held in a
//! [`tree::TreeModel`] and writes edits back through the nodes.
//!
//! # Modules
//!
//! - `value`: the live object graph
//! - `schema`: declared types and introspection
//! - `tree`: the generic tree element model
//! - `node`: value nodes and their capabilities
//! - `walker`: graph → tree conversion

pub mod node;
pub mod schema;
pub mod tree;
pub mod value;
pub mod walker;

use schema::{TypeDesc, TypeRegistry};
use serde::{Deserialize, Serialize};
use value::Value;

/// Everything a save file holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveBlob {
    pub types: TypeRegistry,
    pub root_type: TypeDesc,
    pub root: Value,
}

impl SaveBlob {
    pub fn new(types: TypeRegistry, root_type: TypeDesc, root: Value) -> Self {
        Self {
            types,
            root_type,
            root,
        }
    }
}
