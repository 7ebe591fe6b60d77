//! [`FakeStore`]: an in-memory, versioned, watchable key-value hierarchy.
//!
//! Modelled on the etcd v2 keys API: every mutation bumps a global index,
//! directories are created implicitly, and a watch either replays history
//! from a given index or waits for the next matching change.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mirror_core::{ChangeBatch, ChangeKind, RemoteNode, StoreClient, StoreError};
use mirror_fs::KeyPath;
use tokio::sync::watch;

/// One `watch` call as seen by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRequest {
    pub key: String,
    pub from: Option<u64>,
    pub recursive: bool,
}

#[derive(Debug, Clone)]
struct FakeNode {
    /// `None` marks a directory
    value: Option<Vec<u8>>,
    created: u64,
    modified: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    index: u64,
    nodes: BTreeMap<KeyPath, FakeNode>,
    history: Vec<ChangeBatch>,
    watches: Vec<WatchRequest>,
    get_failures: VecDeque<StoreError>,
    watch_failures: VecDeque<StoreError>,
    unfiltered: bool,
}

/// In-memory [`StoreClient`] for driving the mirror engine in tests.
///
/// # Example
///
/// ```rust,no_run
/// use mirror_test_utils::FakeStore;
///
/// let store = FakeStore::shared();
/// store.put("/foo/txt", "1234");
/// store.delete("/foo/txt");
/// ```
#[derive(Debug)]
pub struct FakeStore {
    state: Mutex<StoreState>,
    index: watch::Sender<u64>,
    armed: watch::Sender<usize>,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            index: watch::Sender::new(0),
            armed: watch::Sender::new(0),
        }
    }

    /// A new store behind an `Arc`, ready to hand to an engine.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// A store that ignores the requested key and always answers reads and
    /// watches for the whole key space, like a client that cannot pre-filter.
    pub fn unfiltered() -> Arc<Self> {
        let store = Self::new();
        store.lock().unfiltered = true;
        Arc::new(store)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current global index.
    pub fn current_index(&self) -> u64 {
        self.lock().index
    }

    /// Set a leaf value, creating parent directories. Returns the new index.
    pub fn put(&self, key: &str, value: impl Into<Vec<u8>>) -> u64 {
        let key = KeyPath::new(key);
        assert!(!key.is_root(), "FakeStore::put: cannot set the root");

        let index = {
            let mut state = self.lock();
            state.index += 1;
            let index = state.index;

            let mut ancestor = key.parent();
            while let Some(dir) = ancestor {
                if dir.is_root() {
                    break;
                }
                let node = state.nodes.entry(dir.clone()).or_insert(FakeNode {
                    value: None,
                    created: index,
                    modified: index,
                });
                assert!(node.value.is_none(), "FakeStore::put: {} is a file", dir);
                ancestor = dir.parent();
            }

            let value = value.into();
            let created = match state.nodes.get(&key) {
                Some(existing) => {
                    assert!(existing.value.is_some(), "FakeStore::put: {} is a directory", key);
                    existing.created
                }
                None => index,
            };
            state.nodes.insert(
                key.clone(),
                FakeNode {
                    value: Some(value.clone()),
                    created,
                    modified: index,
                },
            );
            state.history.push(ChangeBatch::put(RemoteNode {
                key: key.to_string(),
                value: Some(value),
                dir: false,
                children: None,
                created_version: created,
                modified_version: index,
            }));
            index
        };

        self.index.send_replace(index);
        index
    }

    /// Remove a key and everything below it. Returns the new index, or
    /// `None` if the key did not exist.
    pub fn delete(&self, key: &str) -> Option<u64> {
        let key = KeyPath::new(key);
        let index = {
            let mut state = self.lock();
            let removed = state.nodes.get(&key).cloned()?;
            state.nodes.retain(|k, _| !k.starts_with(&key));
            state.index += 1;
            let index = state.index;
            state.history.push(ChangeBatch::remove(RemoteNode {
                key: key.to_string(),
                value: None,
                dir: removed.value.is_none(),
                children: None,
                created_version: removed.created,
                modified_version: index,
            }));
            index
        };

        self.index.send_replace(index);
        Some(index)
    }

    /// Make the next `get` fail with `error`.
    pub fn fail_next_get(&self, error: StoreError) {
        self.lock().get_failures.push_back(error);
    }

    /// Make the next `watch` fail with `error`.
    pub fn fail_next_watch(&self, error: StoreError) {
        self.lock().watch_failures.push_back(error);
    }

    /// Every watch armed so far, in order.
    pub fn watch_requests(&self) -> Vec<WatchRequest> {
        self.lock().watches.clone()
    }

    /// Wait until at least `count` watches have been armed.
    pub async fn wait_for_watches(&self, count: usize) -> Vec<WatchRequest> {
        let mut armed = self.armed.subscribe();
        armed
            .wait_for(|n| *n >= count)
            .await
            .expect("FakeStore::wait_for_watches: store dropped");
        self.watch_requests()
    }
}

impl StoreState {
    fn build(&self, key: &KeyPath, recursive: bool) -> RemoteNode {
        let (value, created, modified) = match self.nodes.get(key) {
            Some(node) => (node.value.clone(), node.created, node.modified),
            None => (None, 0, 0),
        };
        if value.is_some() {
            return RemoteNode {
                key: key.to_string(),
                value,
                dir: false,
                children: None,
                created_version: created,
                modified_version: modified,
            };
        }

        let children = self
            .nodes
            .keys()
            .filter(|k| k.parent().as_ref() == Some(key))
            .map(|child| {
                if recursive {
                    self.build(child, true)
                } else {
                    let node = &self.nodes[child];
                    RemoteNode {
                        key: child.to_string(),
                        value: node.value.clone(),
                        dir: node.value.is_none(),
                        children: None,
                        created_version: node.created,
                        modified_version: node.modified,
                    }
                }
            })
            .collect();

        RemoteNode {
            key: key.to_string(),
            value: None,
            dir: true,
            children: Some(children),
            created_version: created,
            modified_version: modified,
        }
    }

    fn matches(&self, batch: &ChangeBatch, key: &KeyPath, recursive: bool) -> bool {
        if self.unfiltered {
            return true;
        }
        let changed = KeyPath::new(&batch.node.key);
        if !recursive {
            return &changed == key;
        }
        changed.starts_with(key) || (batch.kind == ChangeKind::Remove && key.starts_with(&changed))
    }
}

#[async_trait]
impl StoreClient for FakeStore {
    async fn get(&self, key: &str, recursive: bool) -> Result<RemoteNode, StoreError> {
        let mut state = self.lock();
        if let Some(error) = state.get_failures.pop_front() {
            return Err(error);
        }

        let target = if state.unfiltered {
            KeyPath::root()
        } else {
            KeyPath::new(key)
        };
        if !target.is_root() && !state.nodes.contains_key(&target) {
            return Err(StoreError::not_found(target.to_string()));
        }
        Ok(state.build(&target, recursive))
    }

    async fn watch(
        &self,
        key: &str,
        from: Option<u64>,
        recursive: bool,
    ) -> Result<ChangeBatch, StoreError> {
        let mut changes = self.index.subscribe();
        let key = KeyPath::new(key);

        let from = {
            let mut state = self.lock();
            state.watches.push(WatchRequest {
                key: key.to_string(),
                from,
                recursive,
            });
            self.armed.send_replace(state.watches.len());
            if let Some(error) = state.watch_failures.pop_front() {
                return Err(error);
            }
            from.unwrap_or(state.index + 1)
        };

        loop {
            {
                let state = self.lock();
                if let Some(batch) = state.history.iter().find(|b| {
                    b.node.modified_version >= from && state.matches(b, &key, recursive)
                }) {
                    return Ok(batch.clone());
                }
            }
            if changes.changed().await.is_err() {
                return Err(StoreError::transport("fake store shut down"));
            }
        }
    }
}
