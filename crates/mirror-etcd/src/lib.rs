//! etcd v2 keys API client
//!
//! Implements [`mirror_core::StoreClient`] over HTTP so a
//! [`mirror_core::MirrorEngine`] can mirror a live etcd cluster.

pub mod client;
pub mod error;
pub mod model;

pub use client::EtcdClient;
pub use error::{Error, Result};
