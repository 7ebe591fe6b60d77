//! MirrorEngine implementation
//!
//! The engine keeps a sink eventually consistent with one subtree of the
//! store. It performs a full read, writes it out, then watches for changes
//! one batch at a time:
//!
//! ```text
//! Idle -> Syncing -> Watching -> (Applying -> Watching)* -> Stopped
//!            |           |
//!            +-----------+--> Errored
//! ```
//!
//! Only one watch is ever outstanding, and it is dropped as soon as a batch
//! arrives; the next one is armed from the advanced cursor only after every
//! write of the batch has finished. Batches are therefore applied in store
//! order and never against a stale cursor.

use std::path::Path;
use std::sync::Arc;

use mirror_fs::{DirectorySink, KeyPath, Sink};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::Instrument;

use crate::cursor::Cursor;
use crate::event::{MirrorEvent, MirrorPhase};
use crate::flatten::{FlatEntry, Removal, flatten, removal_target};
use crate::node::{ChangeBatch, ChangeKind};
use crate::store::StoreClient;
use crate::{Error, Result};

/// Process-local state of one mirror.
///
/// Never persisted: a restarted engine always begins with a full read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorState {
    /// The key-space path being mirrored, fixed at construction
    pub subtree_root: KeyPath,
    /// Last fully applied version
    pub cursor: Cursor,
}

/// Mirrors one subtree of a [`StoreClient`] into a [`Sink`].
pub struct MirrorEngine {
    client: Arc<dyn StoreClient>,
    sink: Arc<dyn Sink>,
    state: MirrorState,
    cancel: CancellationToken,
}

impl MirrorEngine {
    /// Create an engine for `subtree_root`.
    ///
    /// An empty root means the whole key space (`/`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the root is not absolute or
    /// contains `..` or NUL.
    pub fn new(
        client: Arc<dyn StoreClient>,
        subtree_root: &str,
        sink: Arc<dyn Sink>,
    ) -> Result<Self> {
        let subtree_root = parse_root(subtree_root)?;
        Ok(Self {
            client,
            sink,
            state: MirrorState {
                subtree_root,
                cursor: Cursor::new(),
            },
            cancel: CancellationToken::new(),
        })
    }

    /// Create an engine writing into a [`DirectorySink`] rooted at `dir`.
    pub fn with_directory(
        client: Arc<dyn StoreClient>,
        subtree_root: &str,
        dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let sink = DirectorySink::new(dir.as_ref())
            .map_err(|e| Error::configuration(dir.as_ref().display().to_string(), e.to_string()))?;
        Self::new(client, subtree_root, Arc::new(sink))
    }

    pub fn subtree_root(&self) -> &KeyPath {
        &self.state.subtree_root
    }

    pub fn state(&self) -> &MirrorState {
        &self.state
    }

    /// Token that stops the engine when cancelled, usable before `start`.
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the state machine on the current tokio runtime.
    pub fn start(self) -> MirrorHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(MirrorPhase::Idle);
        let cancel = self.cancel.clone();
        let span = tracing::info_span!("mirror", root = %self.state.subtree_root);

        let worker = Worker {
            engine: self,
            events: events_tx,
            phase: phase_tx,
        };
        let task = tokio::spawn(worker.run().instrument(span));

        MirrorHandle {
            events: events_rx,
            phase: phase_rx,
            _stop_on_drop: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }
}

fn parse_root(raw: &str) -> Result<KeyPath> {
    if raw.is_empty() {
        return Ok(KeyPath::root());
    }
    if !raw.starts_with('/') {
        return Err(Error::configuration(raw, "subtree root must be an absolute key path"));
    }
    if raw.contains('\0') {
        return Err(Error::configuration(raw, "subtree root contains a NUL byte"));
    }
    if raw.split('/').any(|segment| segment == "..") {
        return Err(Error::configuration(raw, "subtree root must not contain '..'"));
    }
    Ok(KeyPath::new(raw))
}

/// Control surface of a started engine.
///
/// Dropping the handle stops the engine, the same as [`MirrorHandle::stop`].
pub struct MirrorHandle {
    events: mpsc::UnboundedReceiver<MirrorEvent>,
    phase: watch::Receiver<MirrorPhase>,
    cancel: CancellationToken,
    task: JoinHandle<MirrorPhase>,
    _stop_on_drop: DropGuard,
}

impl MirrorHandle {
    /// Ask the engine to stop.
    ///
    /// Writes already in flight complete; no new watch is armed and no
    /// further batch is applied.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next lifecycle signal, or `None` once the engine has finished and all
    /// signals were consumed.
    pub async fn next_event(&mut self) -> Option<MirrorEvent> {
        self.events.recv().await
    }

    /// Next signal if one is already queued.
    pub fn try_next_event(&mut self) -> Option<MirrorEvent> {
        self.events.try_recv().ok()
    }

    pub fn phase(&self) -> MirrorPhase {
        *self.phase.borrow()
    }

    /// Wait until the phase satisfies `predicate` or the engine finishes.
    pub async fn wait_for_phase(
        &mut self,
        predicate: impl FnMut(&MirrorPhase) -> bool,
    ) -> MirrorPhase {
        let waited = self.phase.wait_for(predicate).await.map(|phase| *phase);
        match waited {
            Ok(phase) => phase,
            Err(_) => *self.phase.borrow(),
        }
    }

    /// Wait for the engine task to finish and return its final phase.
    pub async fn join(self) -> MirrorPhase {
        let Self {
            task,
            _stop_on_drop,
            ..
        } = self;
        match task.await {
            Ok(phase) => phase,
            Err(e) => {
                tracing::error!(error = %e, "Mirror task aborted");
                MirrorPhase::Errored
            }
        }
    }
}

/// The running state machine; owns the engine for its whole life.
struct Worker {
    engine: MirrorEngine,
    events: mpsc::UnboundedSender<MirrorEvent>,
    phase: watch::Sender<MirrorPhase>,
}

impl Worker {
    async fn run(mut self) -> MirrorPhase {
        match self.drive().await {
            Ok(()) => {
                tracing::info!("Mirror stopped");
                self.set_phase(MirrorPhase::Stopped);
                MirrorPhase::Stopped
            }
            Err(cause) => {
                tracing::error!(error = %cause, "Mirror failed");
                self.set_phase(MirrorPhase::Errored);
                self.emit(MirrorEvent::Errored { cause });
                MirrorPhase::Errored
            }
        }
    }

    async fn drive(&mut self) -> Result<()> {
        let cancel = self.engine.cancel.clone();
        if cancel.is_cancelled() {
            return Ok(());
        }

        self.set_phase(MirrorPhase::Syncing);
        let root = self.engine.state.subtree_root.clone();
        let snapshot = match self.engine.client.get(root.as_str(), true).await {
            Ok(node) => Some(node),
            Err(e) if e.is_not_found() => {
                tracing::debug!("Subtree root does not exist; mirroring an empty tree");
                None
            }
            Err(source) => {
                return Err(Error::Read {
                    key: root.to_string(),
                    source,
                });
            }
        };

        if cancel.is_cancelled() {
            return Ok(());
        }

        let entries = flatten(snapshot.as_ref(), &root);
        let written = self.write_entries(&entries).await?;
        if let Some(node) = &snapshot {
            self.engine.state.cursor.observe(node);
        }

        self.set_phase(MirrorPhase::Watching);
        tracing::info!(
            entries = written,
            cursor = ?self.engine.state.cursor.get(),
            "Initial sync complete"
        );
        self.emit(MirrorEvent::Synced);

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            self.set_phase(MirrorPhase::Watching);
            let from = self.engine.state.cursor.watch_from();
            tracing::debug!(from = ?from, "Arming watch");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                result = self.engine.client.watch(root.as_str(), from, true) => result,
            };

            let batch = match result {
                Ok(batch) => batch,
                Err(e) if e.is_not_found() => {
                    tracing::debug!(error = %e, "Watch reported a missing key; re-arming");
                    continue;
                }
                Err(source) => {
                    return Err(Error::Watch {
                        key: root.to_string(),
                        source,
                    });
                }
            };

            if cancel.is_cancelled() {
                return Ok(());
            }

            self.set_phase(MirrorPhase::Applying);
            let applied = self.apply(&batch, &root).await?;
            let cursor = self.engine.state.cursor.observe(&batch.node);

            match cursor {
                Some(cursor) if applied => {
                    tracing::info!(key = %batch.node.key, cursor, "Applied change");
                    self.emit(MirrorEvent::Changed { cursor });
                }
                _ => {
                    tracing::debug!(
                        key = %batch.node.key,
                        cursor = ?cursor,
                        "Change outside subtree root; nothing to apply"
                    );
                }
            }
        }
    }

    /// Apply one change batch. Returns whether the sink was touched.
    async fn apply(&self, batch: &ChangeBatch, root: &KeyPath) -> Result<bool> {
        match batch.kind {
            ChangeKind::Put => {
                let entries = flatten(Some(&batch.node), root);
                Ok(self.write_entries(&entries).await? > 0)
            }
            ChangeKind::Remove => match removal_target(&batch.node, root) {
                Some(Removal::File(path)) => {
                    tracing::debug!(%path, "Deleting file");
                    self.engine.sink.delete(path.as_str()).await?;
                    Ok(true)
                }
                Some(Removal::Tree(path)) => {
                    tracing::debug!(%path, "Deleting tree");
                    self.engine.sink.delete_tree(path.as_str()).await?;
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    /// Write entries one at a time; the first failure aborts the rest.
    async fn write_entries(&self, entries: &[FlatEntry]) -> Result<usize> {
        for entry in entries {
            tracing::debug!(path = %entry.relative_path, bytes = entry.value.len(), "Writing entry");
            self.engine
                .sink
                .set(entry.relative_path.as_str(), &entry.value)
                .await?;
        }
        Ok(entries.len())
    }

    fn set_phase(&self, phase: MirrorPhase) {
        self.phase.send_replace(phase);
    }

    fn emit(&self, event: MirrorEvent) {
        // Nobody listening is fine; the handle may have been dropped
        let _ = self.events.send(event);
    }
}
