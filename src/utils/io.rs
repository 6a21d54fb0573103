//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Read file contents, treating a missing file as `None`.
pub fn read_file_optional(path: &Path, operation: &str) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::internal_io(
            e.to_string(),
            Some(operation.to_string()),
        )),
    }
}

/// Temp file path used for atomic writes of `path`.
pub fn temp_path_for(path: &Path, operation: &str) -> Result<PathBuf> {
    let filename = path.file_name().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok(parent.join(format!("{}.tmp", filename.to_string_lossy())))
}

/// A write that has reached the temp file but not yet replaced the target.
///
/// Dropping without `commit` leaves the target untouched, which is the state
/// a crash between the two steps would produce.
#[derive(Debug)]
pub struct StagedWrite {
    target: PathBuf,
    tmp: PathBuf,
    operation: String,
}

impl StagedWrite {
    pub fn tmp_path(&self) -> &Path {
        &self.tmp
    }

    /// Rename the temp file over the target.
    pub fn commit(self) -> Result<()> {
        fs::rename(&self.tmp, &self.target).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("{} (rename)", self.operation)))
        })
    }
}

/// Write `content` to the temp sibling of `path` without touching `path`.
pub fn stage_write(path: &Path, content: &str, operation: &str) -> Result<StagedWrite> {
    let tmp = temp_path_for(path, operation)?;

    fs::write(&tmp, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("{} (write temp)", operation)))
    })?;

    Ok(StagedWrite {
        target: path.to_path_buf(),
        tmp,
        operation: operation.to_string(),
    })
}

/// Write content to file atomically (write to .tmp, then rename).
///
/// The rename is atomic on POSIX filesystems, so readers see either the old
/// content or the new content.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    stage_write(path, content, operation)?.commit()
}
