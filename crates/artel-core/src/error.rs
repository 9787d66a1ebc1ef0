//! Error types for the Artel core.

use thiserror::Error;

/// Core errors that can occur while building or decoding catalog data.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid slug: {0}")]
    InvalidSlug(String),

    #[error("invalid peer address: {0}")]
    InvalidPeerAddress(String),

    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u64),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}
