//! Save file loading.
//!
//! This module reads save files from disk, transparently decompressing
//! gzipped ones, and lists the save files in a directory. Decoding the bytes
//! is the codec's job (see [`super::codec`]).

use crate::error::{DecodeError, SaveError};
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Gzip magic bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Reads a save file's raw bytes.
///
/// Files ending in `.gz`, or starting with the gzip magic bytes, are
/// decompressed.
///
/// # Examples
///
/// ```no_run
/// use savequill::file::loader::read_save_bytes;
///
/// let bytes = read_save_bytes("slot1.sav.gz").unwrap();
/// ```
///
/// # Errors
///
/// - [`SaveError::Io`] if the file cannot be read
/// - [`SaveError::Decode`] if it looks gzipped but does not decompress
pub fn read_save_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, SaveError> {
    let path = path.as_ref();
    let raw = fs::read(path).map_err(|e| SaveError::io(path, e))?;

    if is_gzip_path(path) || raw.starts_with(&GZIP_MAGIC) {
        decompress_gzip_bytes(&raw).map_err(SaveError::from)
    } else {
        Ok(raw)
    }
}

/// Returns true if the path names a gzipped file.
pub fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Decompresses gzip-compressed bytes.
pub fn decompress_gzip_bytes(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(DecodeError::Gzip)?;
    Ok(out)
}

/// Lists the save files in `dir` whose name ends in `.{extension}` (or
/// `.{extension}.gz`), sorted by name.
///
/// # Examples
///
/// ```no_run
/// use savequill::file::loader::list_save_files;
///
/// for path in list_save_files("saves", "sav").unwrap() {
///     println!("{}", path.display());
/// }
/// ```
pub fn list_save_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let suffix = format!(".{}", extension.trim_start_matches('.').to_lowercase());
    let gz_suffix = format!("{}.gz", suffix);

    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read save directory {}", dir.display()))?;

    let mut saves = Vec::new();
    for entry in entries {
        let entry = entry.context("Failed to read directory entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.ends_with(&suffix) || name.ends_with(&gz_suffix) {
            saves.push(path);
        }
    }
    saves.sort();
    Ok(saves)
}
