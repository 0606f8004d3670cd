use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Move a file from `src` to `dst`. Uses `rename` first (fast, atomic on same
/// filesystem). Falls back to copy + delete when rename fails, which covers
/// moves across devices.
pub fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    // Fast path: atomic rename
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    // Slow path: copy then remove original
    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    if let Err(e) = std::fs::remove_file(src) {
        // Leave the source where it was rather than keeping two copies.
        let _ = std::fs::remove_file(dst);
        return Err(StorageError::MoveFile {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

/// Moves `source` into `directory`, keeping its base name. An existing entry
/// with the same name is replaced.
pub fn archive_into(source: &Path, directory: &Path) -> Result<PathBuf, StorageError> {
    let file_name = source
        .file_name()
        .ok_or_else(|| StorageError::NoFileName(source.to_path_buf()))?;
    let target = directory.join(file_name);

    move_file(source, &target)?;

    Ok(target)
}

pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.is_dir() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}
