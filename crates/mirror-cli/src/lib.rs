//! etcd-mirror daemon
//!
//! Wires configuration, logging and an etcd client into one supervised
//! [`mirror_core::MirrorEngine`] per configured subtree.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod supervisor;

pub use cli::Cli;
pub use config::{Config, MirrorConfig, RestartConfig, StoreConfig};
pub use error::{CliError, Result};
pub use supervisor::Supervisor;
