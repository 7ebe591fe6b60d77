//! In-memory sink for tests and dry runs

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::{Error, KeyPath, Result, Sink};

/// A [`Sink`] that keeps entries in a map keyed by normalized path.
///
/// It follows the same collision rules as a directory tree: a path that has
/// descendants behaves like a directory, and nothing can be stored beneath a
/// path that holds a value. Every operation yields once so callers see the
/// same suspension points as with a real sink.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<BTreeMap<KeyPath, Vec<u8>>>,
    failing: Mutex<BTreeSet<KeyPath>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<KeyPath, Vec<u8>>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every later `set` on `path` fail with an I/O error.
    pub fn fail_writes_to(&self, path: &str) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(KeyPath::new(path));
    }

    /// Current value at `path`, if any.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.entries().get(&KeyPath::new(path)).cloned()
    }

    /// Raw copy of every stored entry.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.entries()
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Every stored entry with values decoded as (lossy) UTF-8.
    pub fn dump(&self) -> BTreeMap<String, String> {
        self.entries()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v).into_owned()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn set(&self, path: &str, contents: &[u8]) -> Result<()> {
        tokio::task::yield_now().await;

        let key = KeyPath::new(path);
        if key.is_root() {
            return Err(Error::invalid_target(path, "cannot write a file over the sink root"));
        }
        if self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&key)
        {
            return Err(Error::io(
                key.as_str(),
                std::io::Error::other("write rejected by memory sink"),
            ));
        }

        let mut entries = self.entries();
        if entries.keys().any(|k| k != &key && k.starts_with(&key)) {
            return Err(Error::PathIsDirectory {
                path: key.as_str().into(),
            });
        }
        let mut ancestor = key.parent();
        while let Some(dir) = ancestor {
            if entries.contains_key(&dir) {
                return Err(Error::io(
                    dir.as_str(),
                    std::io::Error::new(ErrorKind::NotADirectory, "ancestor is a file"),
                ));
            }
            ancestor = dir.parent();
        }

        entries.insert(key, contents.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        tokio::task::yield_now().await;

        let key = KeyPath::new(path);
        let mut entries = self.entries();
        if entries.remove(&key).is_none() && entries.keys().any(|k| k.starts_with(&key)) {
            return Err(Error::io(
                key.as_str(),
                std::io::Error::new(ErrorKind::IsADirectory, "path is a directory"),
            ));
        }
        Ok(())
    }

    async fn delete_tree(&self, path: &str) -> Result<()> {
        tokio::task::yield_now().await;

        let key = KeyPath::new(path);
        self.entries().retain(|k, _| !k.starts_with(&key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn set_normalizes_paths() {
        let sink = MemorySink::new();
        sink.set("zoinx", b"AAA").await.unwrap();
        sink.set("/foo//bar", b"BBB").await.unwrap();

        assert_eq!(
            sink.dump(),
            BTreeMap::from([
                ("/foo/bar".to_string(), "BBB".to_string()),
                ("/zoinx".to_string(), "AAA".to_string()),
            ])
        );
    }

    #[tokio::test]
    async fn set_over_directory_fails() {
        let sink = MemorySink::new();
        sink.set("/foo/bar", b"A").await.unwrap();

        let result = sink.set("/foo", b"B").await;
        assert!(matches!(result, Err(Error::PathIsDirectory { .. })));
    }

    #[tokio::test]
    async fn set_below_file_fails() {
        let sink = MemorySink::new();
        sink.set("/foo", b"A").await.unwrap();

        assert!(sink.set("/foo/bar", b"B").await.is_err());
        assert_eq!(sink.get("/foo"), Some(b"A".to_vec()));
    }

    #[tokio::test]
    async fn delete_missing_is_ok() {
        let sink = MemorySink::new();
        sink.delete("/never/written").await.unwrap();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn delete_tree_root_clears_everything() {
        let sink = MemorySink::new();
        sink.set("/a/b", b"1").await.unwrap();
        sink.set("/c", b"2").await.unwrap();

        sink.delete_tree("/").await.unwrap();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn failing_path_rejects_writes() {
        let sink = MemorySink::new();
        sink.fail_writes_to("/bad");

        assert!(matches!(sink.set("bad", b"x").await, Err(Error::Io { .. })));
        sink.set("/good", b"y").await.unwrap();
        assert_eq!(sink.len(), 1);
    }
}
