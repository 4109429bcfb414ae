//! Configuration system for savequill.
//!
//! This module provides the configuration structure for savequill with sensible
//! defaults and support for serialization/deserialization via serde.
//! Configuration is loaded from a TOML file; missing keys take their defaults.
//!
//! # Example
//!
//! ```
//! use savequill::config::Config;
//!
//! // Use default configuration
//! let config = Config::default();
//! assert_eq!(config.extension, "sav");
//! assert_eq!(config.max_nodes, 15_000);
//!
//! // Create custom configuration
//! let custom = Config {
//!     codec: "json".to_string(),
//!     create_backup: true,
//!     ..Config::default()
//! };
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the savequill application.
///
/// # Fields
///
/// * `save_dir` - Directory searched for saves by `list` (default: the platform data dir)
/// * `extension` - Extension of save files, without the dot (default: "sav")
/// * `max_nodes` - Node ceiling for one walk of the object graph (default: 15000)
/// * `codec` - Blob codec: "auto", "bincode", "json" or "yaml" (default: "auto")
/// * `create_backup` - Create .bak files before saving (default: false)
/// * `show_values` - Show values rather than type labels in the value column (default: true)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory searched for save files
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,

    /// Extension of save files
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Maximum number of tree nodes built by one walk
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    /// Blob codec name, or "auto" to pick by file name
    #[serde(default = "default_codec")]
    pub codec: String,

    /// Create .bak files before saving
    #[serde(default)]
    pub create_backup: bool,

    /// Show values in the value column (false shows declared types)
    #[serde(default = "default_show_values")]
    pub show_values: bool,
}

/// Returns the default save directory.
fn default_save_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("savequill"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the default save file extension.
fn default_extension() -> String {
    "sav".to_string()
}

/// Returns the default node ceiling.
fn default_max_nodes() -> usize {
    15_000
}

/// Returns the default codec setting.
fn default_codec() -> String {
    "auto".to_string()
}

fn default_show_values() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            extension: default_extension(),
            max_nodes: default_max_nodes(),
            codec: default_codec(),
            create_backup: false,
            show_values: default_show_values(),
        }
    }
}

impl Config {
    /// Returns the path to the config file.
    ///
    /// Uses `~/.config/savequill/config.toml` on all platforms.
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|mut path| {
            path.push(".config");
            path.push("savequill");
            path.push("config.toml");
            path
        })
    }

    /// Loads configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist or can't be read.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Loads configuration from a specific file, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Saves configuration to the default config file.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        self.save_to(&config_path)
    }

    /// Saves configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }
}
