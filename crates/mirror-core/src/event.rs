//! Lifecycle signals and phases published by a running engine

use crate::Error;

/// Signals emitted by a [`crate::MirrorEngine`].
///
/// `Errored` is terminal: nothing follows it.
#[derive(Debug)]
pub enum MirrorEvent {
    /// The initial full read has been written to the sink
    Synced,
    /// One change batch has been applied; `cursor` is the highest version seen
    Changed { cursor: u64 },
    /// A fatal error stopped the engine
    Errored { cause: Error },
}

/// Where the engine's state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorPhase {
    /// Constructed, not started
    Idle,
    /// Performing the initial full read and write
    Syncing,
    /// One watch is outstanding
    Watching,
    /// Writing a received change batch; no watch is armed
    Applying,
    /// Stopped on request
    Stopped,
    /// Stopped by a fatal error
    Errored,
}

impl MirrorPhase {
    /// Whether the engine has finished for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Errored)
    }
}
