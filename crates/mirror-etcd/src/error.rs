//! Error types for mirror-etcd

/// Result type for mirror-etcd operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors building an [`crate::EtcdClient`]
///
/// Failures of individual requests surface as [`mirror_core::StoreError`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid etcd endpoint {endpoint:?}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
