//! Shared test utilities for the etcd-mirror workspace.
//!
//! This crate provides standardised fixtures to eliminate duplication across
//! crate test suites. It is a dev-dependency only and is never published.
//!
//! # Modules
//!
//! - [`store`]: [`FakeStore`], an in-memory versioned store with watches
//! - [`tree`]: helpers for asserting on mirrored directory trees

use std::future::Future;
use std::time::Duration;

pub mod store;
pub mod tree;

pub use store::{FakeStore, WatchRequest};
pub use tree::read_dir_tree;

/// Upper bound for any single awaited step in a test.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `future`, panicking if it takes longer than [`STEP_TIMEOUT`].
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(STEP_TIMEOUT, future)
        .await
        .expect("test step timed out")
}
