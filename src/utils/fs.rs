/*!
 * File helpers shared by the registries.
 *
 * Checkpoint files are always replaced through a temporary sibling and a
 * rename, so a reader never observes a half-written checkpoint.
 */

use crate::error::{CheckpointError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write `data` to `path` through a uniquely named temporary sibling.
///
/// Creates the parent directory when it does not exist yet.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CheckpointError::io(parent, e))?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("checkpoint"),
        uuid::Uuid::new_v4()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut file = std::fs::File::create(&temp_path).map_err(|e| CheckpointError::io(&temp_path, e))?;
    file.write_all(data)
        .and_then(|_| file.sync_all())
        .map_err(|e| CheckpointError::io(&temp_path, e))?;
    drop(file);

    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        CheckpointError::io(path, e)
    })
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| CheckpointError::io(path, e))
}

pub fn read_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| CheckpointError::io(path, e))
}

/// Copy a staged file into place, replacing any previous checkpoint.
pub fn copy_atomic(from: &Path, to: &Path) -> Result<()> {
    let data = read_bytes(from)?;
    write_atomic(to, &data)
}

/// Path of the per-name checkpoint file under `dir`.
///
/// Path separators in `name` are replaced so every name maps to exactly one
/// file directly inside `dir`.
pub fn checkpoint_file(dir: &Path, name: &str) -> PathBuf {
    let file_name: String = name
        .chars()
        .map(|c| if std::path::is_separator(c) { '_' } else { c })
        .collect();
    dir.join(file_name)
}
