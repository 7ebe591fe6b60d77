//! StoreClient trait: the engine's view of the remote key-value store

use async_trait::async_trait;

use crate::node::{ChangeBatch, RemoteNode};

/// Boxed source error carried by [`StoreError::Transport`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures reported by a [`StoreClient`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key does not exist
    #[error("Key not found: {key}")]
    NotFound { key: String },

    /// Any other failure talking to the store
    #[error("Store transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl StoreError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    pub fn transport_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Client for a hierarchical, versioned key-value store.
///
/// Connection handling, retries and timeouts are the implementation's
/// concern; the engine treats every non-`NotFound` error as fatal.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Read `key`, including all descendants when `recursive` is set.
    async fn get(&self, key: &str, recursive: bool) -> Result<RemoteNode, StoreError>;

    /// Wait for the next change at or below `key`.
    ///
    /// With `from` set, the first change whose version is `>= from` is
    /// returned (possibly immediately, from history). With `None`, only
    /// changes made after the call are reported. Dropping the returned future
    /// cancels the watch.
    async fn watch(
        &self,
        key: &str,
        from: Option<u64>,
        recursive: bool,
    ) -> Result<ChangeBatch, StoreError>;
}
