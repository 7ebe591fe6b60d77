//! Sink backed by a real directory tree

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::io::{self, WriteOptions};
use crate::{Error, KeyPath, Result, Sink};

/// Mirrors entries as files under a root directory.
///
/// The root need not exist; it is created by the first write. Blocking
/// filesystem calls run on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
    options: WriteOptions,
}

impl DirectorySink {
    /// Create a sink rooted at `root`.
    ///
    /// Relative roots are resolved against the current working directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRoot`] if the root cannot be made absolute or
    /// already exists as something other than a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(root, WriteOptions::default())
    }

    /// Create a sink with custom write options.
    pub fn with_options(root: impl AsRef<Path>, options: WriteOptions) -> Result<Self> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(Error::InvalidRoot {
                path: root.to_path_buf(),
                message: "root path is empty".into(),
            });
        }

        let absolute = std::path::absolute(root).map_err(|e| Error::InvalidRoot {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        let absolute = dunce::simplified(&absolute).to_path_buf();

        match fs::metadata(&absolute) {
            Ok(m) if !m.is_dir() => {
                return Err(Error::InvalidRoot {
                    path: absolute,
                    message: "exists and is not a directory".into(),
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::InvalidRoot {
                    path: absolute,
                    message: e.to_string(),
                });
            }
        }

        Ok(Self {
            root: absolute,
            options,
        })
    }

    /// The resolved absolute root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

}

/// Resolve a sink key to a native path under `root`.
///
/// Existing intermediate components must be real directories: a symlink
/// could redirect the write outside the root. Blocking; call from the
/// blocking pool.
fn resolve(root: &Path, key: &KeyPath) -> Result<PathBuf> {
    let mut current = root.to_path_buf();
    let segments: Vec<&str> = key.segments().collect();
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        current.push(segment);
        match fs::symlink_metadata(&current) {
            Ok(m) if m.file_type().is_symlink() => {
                return Err(Error::SymlinkInPath { path: current });
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Ok(key.to_native_under(root))
}

#[async_trait]
impl Sink for DirectorySink {
    async fn set(&self, path: &str, contents: &[u8]) -> Result<()> {
        let key = KeyPath::new(path);
        if key.is_root() {
            return Err(Error::invalid_target(path, "cannot write a file over the sink root"));
        }

        let root = self.root.clone();
        let relative = key.clone();
        let contents = contents.to_vec();
        let options = self.options;
        tokio::task::spawn_blocking(move || {
            let target = resolve(&root, &relative)?;
            io::write_atomic(&target, &contents, options)
        })
        .await??;

        tracing::trace!(path = %key, "Wrote file");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let key = KeyPath::new(path);
        if key.is_root() {
            return Err(Error::invalid_target(path, "cannot delete the sink root as a file"));
        }

        let root = self.root.clone();
        let relative = key.clone();
        let removed = tokio::task::spawn_blocking(move || {
            let target = resolve(&root, &relative)?;
            io::remove_file(&target)
        })
        .await??;

        tracing::trace!(path = %key, removed, "Deleted file");
        Ok(())
    }

    async fn delete_tree(&self, path: &str) -> Result<()> {
        let key = KeyPath::new(path);
        let root = self.root.clone();
        let relative = key.clone();

        tokio::task::spawn_blocking(move || {
            let target = resolve(&root, &relative)?;
            if relative.is_root() {
                io::clear_dir(&target)
            } else {
                io::remove_tree(&target).map(|_| ())
            }
        })
        .await??;

        tracing::trace!(path = %key, "Deleted tree");
        Ok(())
    }
}
