//! Save file writing.
//!
//! This module writes encoded saves to disk with atomic write operations and
//! optional backup creation.

use crate::error::{EncodeError, SaveError};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes an encoded save to `path`.
///
/// Targets ending in `.gz` are gzip-compressed. When `create_backup` is set
/// and the target exists, it is first copied to `<name>.bak`.
///
/// # Atomic Write
///
/// The bytes go to a temporary file next to the target, which is then
/// renamed over it. The target is never left partially written; on failure
/// the temporary file is removed.
///
/// # Examples
///
/// ```no_run
/// use savequill::file::saver::write_save_bytes;
///
/// write_save_bytes("slot1.sav", b"...", true).unwrap();
/// ```
pub fn write_save_bytes<P: AsRef<Path>>(
    path: P,
    data: &[u8],
    create_backup: bool,
) -> Result<(), SaveError> {
    let path = path.as_ref();

    if create_backup && path.exists() {
        self::create_backup(path)?;
    }

    let compress = super::loader::is_gzip_path(path);
    write_file_atomic(path, data, compress)
}

/// Path of the backup copy of a save file.
pub fn backup_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, "bak")
}

/// Creates a backup of a file by copying it with a .bak extension.
fn create_backup(path: &Path) -> Result<(), SaveError> {
    let backup = backup_path(path);
    fs::copy(path, &backup).map_err(|e| SaveError::io(&backup, e))?;
    tracing::debug!("backed up {} to {}", path.display(), backup.display());
    Ok(())
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Writes data to a file atomically, optionally compressing with gzip.
fn write_file_atomic(path: &Path, data: &[u8], compress: bool) -> Result<(), SaveError> {
    let temp_path = sibling_with_suffix(path, "tmp");

    let result = write_temp(&temp_path, data, compress)
        .and_then(|_| fs::rename(&temp_path, path).map_err(|e| SaveError::io(path, e)));

    if result.is_err() {
        // never leave a half-written temp file behind
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_temp(temp_path: &Path, data: &[u8], compress: bool) -> Result<(), SaveError> {
    if compress {
        let packed = gzip(data)?;
        fs::write(temp_path, packed).map_err(|e| SaveError::io(temp_path, e))
    } else {
        fs::write(temp_path, data).map_err(|e| SaveError::io(temp_path, e))
    }
}

/// Compresses encoded save bytes in memory.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>, EncodeError> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(EncodeError::Gzip)?;
    encoder.finish().map_err(EncodeError::Gzip)
}
