//! Watch/resume engine for mirroring a key-value subtree
//!
//! This crate keeps a [`mirror_fs::Sink`] eventually consistent with one
//! subtree of a hierarchical, versioned key-value store:
//!
//! - **Data model**: [`RemoteNode`] snapshots and [`ChangeBatch`] notifications
//! - **Flattening**: hierarchical snapshots to scoped [`FlatEntry`] values
//! - **Cursor**: the highest observed version, used to resume watching
//! - **MirrorEngine**: the serialized read / watch / apply state machine
//! - **Events**: [`MirrorEvent`] signals and [`MirrorPhase`] observation
//!
//! # Architecture
//!
//! ```text
//!         StoreClient (etcd, fake)
//!                 |
//!            MirrorEngine ---> MirrorEvent
//!            /         \
//!      flatten/cursor   Sink (directory, memory)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mirror_core::{MirrorEngine, MirrorEvent};
//!
//! async fn mirror(client: Arc<dyn mirror_core::StoreClient>) -> mirror_core::Result<()> {
//!     let engine = MirrorEngine::with_directory(client, "/stiitops", "/run/power/stiitops")?;
//!     let mut handle = engine.start();
//!     while let Some(event) = handle.next_event().await {
//!         if let MirrorEvent::Errored { cause } = event {
//!             return Err(cause);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod cursor;
pub mod engine;
pub mod error;
pub mod event;
pub mod flatten;
pub mod node;
pub mod store;

pub use cursor::{Cursor, max_version};
pub use engine::{MirrorEngine, MirrorHandle, MirrorState};
pub use error::{Error, Result};
pub use event::{MirrorEvent, MirrorPhase};
pub use flatten::{FlatEntry, Removal, flatten, removal_target};
pub use node::{ChangeBatch, ChangeKind, RemoteNode};
pub use store::{BoxError, StoreClient, StoreError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_displays_key_and_cause() {
        let error = Error::Read {
            key: "/stiitops".to_string(),
            source: StoreError::transport("connection refused"),
        };

        let display = format!("{}", error);
        assert!(
            display.contains("/stiitops"),
            "Error display should contain the key, got: {}",
            display
        );
        assert!(
            display.contains("connection refused"),
            "Error display should contain the cause, got: {}",
            display
        );
    }

    #[test]
    fn not_found_is_not_a_transport_error() {
        assert!(StoreError::not_found("/x").is_not_found());
        assert!(!StoreError::transport("boom").is_not_found());
    }
}
