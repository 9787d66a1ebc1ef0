//! Error types for the node API.

use thiserror::Error;

use artel_core::CoreError;
use artel_store::StoreError;
use artel_sync::SyncError;

/// Errors that can occur during node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Core-level error (slugs, encoding, peer addresses).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The local artist has not been registered yet.
    #[error("local artist not registered")]
    NotRegistered,

    /// The configured or stored artist identity disagrees with the oracle.
    #[error("artist identity mismatch: {0}")]
    IdentityMismatch(String),

    /// Operation rejected.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;
