//! Crash-safe blocking I/O primitives
//!
//! These are the building blocks of [`crate::DirectorySink`]. They operate on
//! native paths and never consult the sink root; scoping is the caller's job.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use fs2::FileExt;

use crate::{Error, Result};

/// Tuning for [`write_atomic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Flush file contents (and, on unix, the parent directory entry) to
    /// stable storage before returning.
    pub fsync: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { fsync: true }
    }
}

/// Write content atomically to a file, creating missing parent directories.
///
/// The payload goes to a hidden temp file in the target's directory (same
/// filesystem) which is then renamed over the target, so readers observe
/// either the old contents or the new ones. Space for the payload is reserved
/// up front so that a full disk fails the write before anything is renamed.
pub fn write_atomic(path: &Path, content: &[u8], options: WriteOptions) -> Result<()> {
    let parent = path.parent().ok_or_else(|| Error::InvalidTarget {
        path: path.display().to_string(),
        message: "path has no parent directory".into(),
    })?;

    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    if fs::symlink_metadata(path).is_ok_and(|m| m.is_dir()) {
        return Err(Error::PathIsDirectory {
            path: path.to_path_buf(),
        });
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| Error::io(parent, e))?;

    if !content.is_empty() {
        temp.as_file()
            .allocate(content.len() as u64)
            .map_err(|e| Error::io(temp.path(), e))?;
    }

    temp.write_all(content)
        .map_err(|e| Error::io(temp.path(), e))?;

    if options.fsync {
        temp.as_file()
            .sync_all()
            .map_err(|e| Error::io(temp.path(), e))?;
    }

    // Dropping the NamedTempFile on any earlier return removes it
    temp.persist(path).map_err(|e| Error::io(path, e.error))?;

    if options.fsync {
        sync_dir(parent)?;
    }

    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| Error::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Remove a single file.
///
/// Returns `Ok(false)` if nothing was there.
pub fn remove_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Remove a file or a whole directory tree.
///
/// Returns `Ok(false)` if nothing was there.
pub fn remove_tree(path: &Path) -> Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io(path, e)),
    };

    let removed = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match removed {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Remove every entry inside `dir`, keeping `dir` itself.
///
/// A missing directory counts as already empty.
pub fn clear_dir(dir: &Path) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io(dir, e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        remove_tree(&entry.path())?;
    }
    Ok(())
}
