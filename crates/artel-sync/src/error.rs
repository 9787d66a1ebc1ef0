//! Error types for the sync module.

use thiserror::Error;

use crate::messages::WireErrorCode;
use crate::publish::PublicationError;
use crate::signer::SignerError;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Peer sent something other than what the protocol expects here.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Timeout waiting for peer.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Peer sent an error message.
    #[error("peer error ({code:?}): {message}")]
    Peer { code: WireErrorCode, message: String },

    /// Publication failed to sign or verify.
    #[error(transparent)]
    Publication(#[from] PublicationError),

    /// Signing oracle failure.
    #[error(transparent)]
    Signer(#[from] SignerError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] artel_store::StoreError),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
