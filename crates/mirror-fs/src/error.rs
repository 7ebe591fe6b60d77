//! Error types for mirror-fs

use std::path::PathBuf;

/// Result type for mirror-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mirror-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write file at {path}: a directory is in the way")]
    PathIsDirectory { path: PathBuf },

    #[error("Refusing to follow symlink at {path}")]
    SymlinkInPath { path: PathBuf },

    #[error("Invalid sink target {path:?}: {message}")]
    InvalidTarget { path: String, message: String },

    #[error("Invalid sink root {path}: {message}")]
    InvalidRoot { path: PathBuf, message: String },

    #[error("Blocking filesystem task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_target(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTarget {
            path: path.into(),
            message: message.into(),
        }
    }
}
