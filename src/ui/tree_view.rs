//! Tree view data structures for displaying a save as an expandable tree.
//!
//! This module provides:
//! - `TreeViewLine`: A single displayable line in the tree view
//! - `ValueType`: Classification of graph values for display
//! - `TreeViewState`: Manages the list of visible lines, expand/collapse state
//!   and the row filter
//!
//! Lines carry everything a front end needs to draw a row: indentation, the
//! name column, the value column (a preview of the value, or the declared
//! type label when values are hidden), dirty/invalid markers and which
//! structural controls the row offers.

use crate::document::node::ValueNode;
use crate::document::tree::{NodeId, TreeItem};
use crate::document::value::Value;
use crate::editor::state::EditorState;
use std::collections::HashSet;
use std::fmt::Write as _;

/// Previews longer than this are cut with an ellipsis.
const MAX_PREVIEW_CHARS: usize = 60;

/// Represents a single line in the tree view display.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeViewLine {
    /// Node this line shows
    pub id: NodeId,
    /// Indentation depth (0 for children of the root, -1 for the root itself)
    pub depth: i32,
    /// Name column
    pub name: String,
    /// Type of the current value
    pub value_type: ValueType,
    /// Value column: a preview of the value, or the declared type label
    pub value_text: String,
    /// Declared type in generic notation, e.g. `List<i32>`
    pub type_label: String,
    /// The value or key differs from the loaded one
    pub dirty: bool,
    /// The pending edit (value or key) does not parse
    pub invalid: bool,
    pub can_add: bool,
    pub can_remove: bool,
    pub can_rename: bool,
    /// Whether this line has children
    pub expandable: bool,
    /// Whether this line's children are shown
    pub expanded: bool,
}

/// Classification of graph values for display purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Null,
    Boolean,
    Number,
    Text,
    Enum,
    Sequence,
    Map,
    Set,
    Record,
}

impl ValueType {
    /// Determines the value type from a graph value.
    ///
    /// # Example
    ///
    /// ```
    /// use savequill::document::value::Value;
    /// use savequill::ui::tree_view::ValueType;
    ///
    /// assert_eq!(ValueType::from_value(&Value::Int(3)), ValueType::Number);
    /// assert_eq!(ValueType::from_value(&Value::Null), ValueType::Null);
    /// ```
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Boolean,
            Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::BigInt(_) => {
                ValueType::Number
            }
            Value::Text(_) => ValueType::Text,
            Value::Enum(_) => ValueType::Enum,
            Value::Seq(_) => ValueType::Sequence,
            Value::Map(_) => ValueType::Map,
            Value::Set(_) => ValueType::Set,
            Value::Record(_) => ValueType::Record,
        }
    }
}

/// Manages the tree view display state and line generation.
///
/// Every node starts expanded; collapsing hides its descendants from
/// [`lines`](Self::lines) but never from the tree itself.
///
/// With a filter set, only rows whose name or value contains the filter text
/// (ignoring case) are listed, together with their ancestors. Collapse state
/// is ignored while filtering.
#[derive(Debug, Default)]
pub struct TreeViewState {
    lines: Vec<TreeViewLine>,
    collapsed: HashSet<NodeId>,
    show_values: bool,
    filter: Option<String>,
}

impl TreeViewState {
    pub fn new(show_values: bool) -> Self {
        Self {
            lines: Vec::new(),
            collapsed: HashSet::new(),
            show_values,
            filter: None,
        }
    }

    /// Sets the row filter. Blank text clears it.
    pub fn set_filter(&mut self, text: &str) {
        let text = text.trim();
        self.filter = (!text.is_empty()).then(|| text.to_lowercase());
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Returns the list of visible tree view lines.
    pub fn lines(&self) -> &[TreeViewLine] {
        &self.lines
    }

    /// Toggles the expand/collapse state of a node.
    ///
    /// After toggling, call `rebuild()` to regenerate the visible lines.
    pub fn toggle_expand(&mut self, id: NodeId) {
        if !self.collapsed.remove(&id) {
            self.collapsed.insert(id);
        }
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        !self.collapsed.contains(&id)
    }

    pub fn expand_all(&mut self) {
        self.collapsed.clear();
    }

    /// Collapses every node that has children.
    pub fn collapse_all(&mut self, state: &EditorState) {
        let tree = state.tree();
        self.collapsed = tree
            .iter()
            .map(|node| node.id())
            .filter(|&id| !tree.children(id).is_empty())
            .collect();
    }

    /// Rebuilds the list of visible lines from the editor state.
    pub fn rebuild(&mut self, state: &EditorState) {
        self.lines.clear();
        let tree = state.tree();
        let shown = self.filter.as_deref().map(|needle| matching_rows(state, needle));
        let mut stack = vec![tree.root_id()];
        while let Some(id) = stack.pop() {
            if shown.as_ref().is_some_and(|keep| !keep.contains(&id)) {
                continue;
            }
            let Some(node) = tree.get(id) else {
                continue;
            };
            let children = tree.children(id);
            let expanded = shown.is_some() || self.is_expanded(id);
            let line = self.line_for(state, node, !children.is_empty(), expanded);
            self.lines.push(line);
            if expanded {
                stack.extend(children.iter().rev().copied());
            }
        }
        // drop collapse state of nodes that no longer exist
        self.collapsed.retain(|id| tree.contains(*id));
    }

    fn line_for(
        &self,
        state: &EditorState,
        node: &ValueNode,
        expandable: bool,
        expanded: bool,
    ) -> TreeViewLine {
        let type_label = state.registry().type_label(node.declared_type());
        let value_text = if self.show_values {
            value_preview(node)
        } else {
            type_label.clone()
        };
        TreeViewLine {
            id: node.id(),
            depth: node.depth(),
            name: node.name().to_string(),
            value_type: ValueType::from_value(node.current_value()),
            value_text,
            type_label,
            dirty: node.is_dirty(),
            invalid: !node.is_valid() || !node.is_key_valid(),
            can_add: node.can_add(),
            can_remove: node.can_remove(),
            can_rename: node.can_rename(),
            expandable,
            expanded,
        }
    }
}

/// Nodes whose name or value preview contains `needle`, plus their ancestors.
/// `needle` is already lower case.
fn matching_rows(state: &EditorState, needle: &str) -> HashSet<NodeId> {
    let tree = state.tree();
    let mut keep = HashSet::new();
    for node in tree.iter() {
        let hit = node.name().to_lowercase().contains(needle)
            || value_preview(node).to_lowercase().contains(needle);
        if hit && keep.insert(node.id()) {
            keep.extend(tree.ancestors(node.id()));
        }
    }
    keep
}

/// The value column text of a node. A pending edit buffer wins over the
/// committed value.
pub fn value_preview(node: &ValueNode) -> String {
    let text = match node.edit_buffer() {
        Some(buffer) => buffer.to_string(),
        None => match node.current_value() {
            Value::Text(s) => format!("\"{}\"", s),
            other => other.preview(),
        },
    };
    truncate(&text, MAX_PREVIEW_CHARS)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Renders lines as indented plain text, one row per line.
///
/// Markers: `*` dirty, `!` invalid, `+` add, `-` remove, `~` rename.
pub fn render_text(lines: &[TreeViewLine]) -> String {
    let mut out = String::new();
    for line in lines {
        let indent = "  ".repeat((line.depth + 1).max(0) as usize);
        let mut markers = String::new();
        for (on, mark) in [
            (line.dirty, '*'),
            (line.invalid, '!'),
            (line.can_add, '+'),
            (line.can_remove, '-'),
            (line.can_rename, '~'),
        ] {
            if on {
                markers.push(mark);
            }
        }
        let _ = writeln!(
            out,
            "{}{}: {}{}",
            indent,
            line.name,
            line.value_text,
            if markers.is_empty() {
                String::new()
            } else {
                format!("  [{}]", markers)
            }
        );
    }
    out
}
