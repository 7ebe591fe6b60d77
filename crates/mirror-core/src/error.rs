//! Error types for mirror-core

use crate::store::StoreError;

/// Result type for mirror-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mirror-core operations
///
/// Everything except [`Error::Configuration`] is fatal to a running engine and
/// is reported once through [`crate::MirrorEvent::Errored`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid construction arguments
    #[error("Invalid configuration for {subject:?}: {message}")]
    Configuration { subject: String, message: String },

    /// The initial full read of the subtree failed
    #[error("Failed to read {key} from the store: {source}")]
    Read {
        key: String,
        #[source]
        source: StoreError,
    },

    /// An armed watch failed
    #[error("Watch on {key} failed: {source}")]
    Watch {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Filesystem error from mirror-fs
    #[error(transparent)]
    Sink(#[from] mirror_fs::Error),
}

impl Error {
    pub fn configuration(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            subject: subject.into(),
            message: message.into(),
        }
    }
}
