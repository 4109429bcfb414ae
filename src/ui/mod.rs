//! Presentation surface.
//!
//! The editor core has no terminal or window code of its own. This module
//! turns the tree overlay into display rows that a front end (the CLI, or a
//! richer UI) can draw.

pub mod tree_view;
