//! The load/save bridge.
//!
//! A `Session` holds at most one loaded save. Loading reads the file
//! (gunzipping if needed), decodes it with the configured codec, checks that
//! every record type it mentions is described, and walks it into a fresh
//! [`EditorState`]. A failed load leaves whatever was loaded before in place.
//!
//! Saving encodes the live graph, writes it atomically and then makes the
//! current values the new baseline, so nothing reads as dirty afterwards.
//! Nodes with an invalid edit buffer were never written to the graph and keep
//! their buffer and flag across a save.
//!
//! # Example
//!
//! ```no_run
//! use savequill::config::Config;
//! use savequill::editor::session::Session;
//!
//! let mut session = Session::new(Config::load());
//! session.load("slot1.sav").unwrap();
//! let gold = session.find_by_path("wallet/gold").unwrap();
//! session.edit_value(gold, "9999").unwrap();
//! session.save().unwrap();
//! ```

use super::state::EditorState;
use crate::config::Config;
use crate::document::tree::NodeId;
use crate::error::{DecodeError, SaveError};
use crate::file::codec::CodecKind;
use crate::file::{loader, saver};
use crate::ui::tree_view::{TreeViewLine, TreeViewState};
use std::path::{Path, PathBuf};
use tracing::info;

/// One editing session over a save file.
#[derive(Debug)]
pub struct Session {
    config: Config,
    state: Option<EditorState>,
    path: Option<PathBuf>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
            path: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the loaded save, updated by `save_as`.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&EditorState> {
        self.state.as_ref()
    }

    pub fn state_mut(&mut self) -> Option<&mut EditorState> {
        self.state.as_mut()
    }

    fn loaded(&self) -> Result<&EditorState, SaveError> {
        self.state.as_ref().ok_or(SaveError::NotLoaded)
    }

    fn loaded_mut(&mut self) -> Result<&mut EditorState, SaveError> {
        self.state.as_mut().ok_or(SaveError::NotLoaded)
    }

    /// Loads a save, replacing the current one on success.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), SaveError> {
        let path = path.as_ref();
        let bytes = loader::read_save_bytes(path)?;
        let kind = CodecKind::resolve(&self.config.codec, path);
        let blob = kind.codec().decode(&bytes)?;

        if let Some(unknown) = blob.types.missing_records(&blob.root_type).into_iter().next() {
            return Err(DecodeError::UnknownRecord(unknown).into());
        }

        let state = EditorState::new(blob, self.config.max_nodes)?;
        info!(
            "loaded {} ({} codec, {} nodes{})",
            path.display(),
            kind,
            state.tree().len(),
            if state.is_truncated() { ", truncated" } else { "" }
        );

        self.state = Some(state);
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Loads the current file again, dropping all unsaved edits.
    pub fn reload(&mut self) -> Result<(), SaveError> {
        let path = self.path.clone().ok_or(SaveError::NotLoaded)?;
        self.load(path)
    }

    /// Writes the live graph back to the file it was loaded from.
    pub fn save(&mut self) -> Result<(), SaveError> {
        let path = self.path.clone().ok_or(SaveError::NotLoaded)?;
        self.save_as(path)
    }

    /// Writes the live graph to `path`, which becomes the session's file.
    ///
    /// On failure the baselines are left alone, so every edit still reads as
    /// dirty.
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<(), SaveError> {
        let path = path.as_ref();
        let state = self.loaded()?;
        let kind = CodecKind::resolve(&self.config.codec, path);
        let bytes = kind.codec().encode(state.blob())?;
        saver::write_save_bytes(path, &bytes, self.config.create_backup)?;

        self.loaded_mut()?.rebaseline();
        self.path = Some(path.to_path_buf());
        info!("saved {} ({} codec, {} bytes)", path.display(), kind, bytes.len());
        Ok(())
    }

    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        self.state.as_ref()?.find_by_path(path)
    }

    pub fn set_edit_buffer(&mut self, id: NodeId, text: &str) -> Result<(), SaveError> {
        Ok(self.loaded_mut()?.set_edit_buffer(id, text)?)
    }

    pub fn commit_edit(&mut self, id: NodeId) -> Result<bool, SaveError> {
        Ok(self.loaded_mut()?.commit_edit(id)?)
    }

    pub fn edit_value(&mut self, id: NodeId, text: &str) -> Result<(), SaveError> {
        Ok(self.loaded_mut()?.edit_value(id, text)?)
    }

    pub fn set_key_buffer(&mut self, id: NodeId, text: &str) -> Result<(), SaveError> {
        Ok(self.loaded_mut()?.set_key_buffer(id, text)?)
    }

    pub fn rename_key(&mut self, id: NodeId, text: &str) -> Result<(), SaveError> {
        Ok(self.loaded_mut()?.rename_key(id, text)?)
    }

    pub fn add_element(&mut self, id: NodeId) -> Result<NodeId, SaveError> {
        Ok(self.loaded_mut()?.add_element(id)?)
    }

    pub fn remove_element(&mut self, id: NodeId) -> Result<(), SaveError> {
        Ok(self.loaded_mut()?.remove_element(id)?)
    }

    pub fn reset_to_default(&mut self, id: NodeId) -> Result<(), SaveError> {
        Ok(self.loaded_mut()?.reset_to_default(id)?)
    }

    /// Display rows for every node, fully expanded.
    pub fn render_rows(&self) -> Result<Vec<TreeViewLine>, SaveError> {
        self.render_rows_matching("")
    }

    /// Display rows for the nodes whose name or value contains `filter`,
    /// with their ancestors. A blank filter shows everything.
    pub fn render_rows_matching(&self, filter: &str) -> Result<Vec<TreeViewLine>, SaveError> {
        let state = self.loaded()?;
        let mut view = TreeViewState::new(self.config.show_values);
        view.set_filter(filter);
        view.rebuild(state);
        Ok(view.lines().to_vec())
    }
}
