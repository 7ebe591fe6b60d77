//! Filesystem sink for the etcd mirror
//!
//! Provides the [`Sink`] contract the mirror engine writes through, a
//! crash-safe [`DirectorySink`] implementation, an in-memory [`MemorySink`]
//! with identical semantics, and the [`KeyPath`] normalization both share.

pub mod directory;
pub mod error;
pub mod io;
pub mod memory;
pub mod path;
pub mod sink;

pub use directory::DirectorySink;
pub use error::{Error, Result};
pub use io::WriteOptions;
pub use memory::MemorySink;
pub use path::KeyPath;
pub use sink::Sink;
