//! The destination contract shared by real and in-memory sinks

use async_trait::async_trait;

use crate::Result;

/// A destination for flattened key/value entries.
///
/// Paths are resolved relative to the sink's own root; the leading-slash form
/// (`/a/b`) and the bare form (`a/b`) are equivalent, and `..` segments can
/// never climb above the root.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Store `contents` at `path`, creating missing parent directories.
    ///
    /// The write is atomic: a concurrent reader sees the previous contents or
    /// the new ones, never a prefix. Fails if `path` is occupied by a directory.
    async fn set(&self, path: &str, contents: &[u8]) -> Result<()>;

    /// Remove the file at `path`. An absent file is not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Remove whatever lives at `path`, recursively for directories.
    ///
    /// `delete_tree("/")` empties the sink but keeps its root. An absent path
    /// is not an error.
    async fn delete_tree(&self, path: &str) -> Result<()>;
}
