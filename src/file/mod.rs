//! File I/O for save files.
//!
//! This module provides the blob codecs, loading of save files from disk
//! (with transparent gzip support) and saving them back with atomic write
//! operations and optional backups.

pub mod codec;
pub mod loader;
pub mod saver;
