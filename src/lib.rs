//! SaveQuill: a structural editor for serialized object graphs.
//!
//! A save is decoded into a live object graph plus the type descriptions of
//! everything in it. The graph is walked into a tree of editable nodes; edits
//! made through the nodes are written straight back into the graph, which is
//! then re-encoded unchanged except for those edits.

pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod file;
pub mod ui;
