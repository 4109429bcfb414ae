//! Editing a loaded save.
//!
//! This module provides the editor state that keeps the tree overlay and the
//! live object graph in step, the operations that change them, and the
//! session that loads and saves files.
//!
//! # Modules
//!
//! - `state`: the loaded save and its tree (`EditorState`)
//! - `edit`: value and key edits, reset to default
//! - `structural`: adding and removing collection elements
//! - `session`: loading, saving and reloading (`Session`)
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
//! let mut state = EditorState::new(blob, 100).unwrap();
//! let root = state.root_id();
//! state.add_element(root).unwrap();
//! assert_eq!(state.blob().root.len(), 3);
//! ```

pub mod edit;
pub mod session;
pub mod state;
pub mod structural;
