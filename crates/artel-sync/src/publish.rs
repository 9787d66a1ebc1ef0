//! The publication protocol: signing and verifying catalog snapshots.
//!
//! A publication is self-authenticating: the serialized snapshot travels
//! with a sealed signature, and verification proves both that the bytes are
//! untampered and that the signer is the artist the envelope claims.
//! Untrusted bytes are never deserialized before the signature is proven
//! valid.

use thiserror::Error;

use artel_core::{snapshot_bytes, Artist, CatalogSnapshot, CoreError, Publication};
use bytes::Bytes;

use crate::signer::{Signer, SignerError};

/// Failures of the publication protocol.
#[derive(Debug, Error)]
pub enum PublicationError {
    /// The signing oracle could not produce a signature.
    #[error("signing unavailable: {0}")]
    SigningUnavailable(String),

    /// The signature does not verify over the serialized snapshot.
    #[error("invalid signature")]
    InvalidSignature,

    /// The signature is valid but the signer is not the claimed artist.
    #[error("identity mismatch: signer is not the claimed artist")]
    IdentityMismatch,

    /// The signed bytes do not decode to a catalog snapshot.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
}

/// Serialize and sign a snapshot on behalf of `artist`.
pub async fn sign_snapshot<O: Signer + ?Sized>(
    oracle: &O,
    artist: &Artist,
    snapshot: &CatalogSnapshot,
) -> Result<Publication, PublicationError> {
    let serialized = snapshot_bytes(snapshot);
    let signature = oracle
        .sign(&serialized)
        .await
        .map_err(|SignerError::Unavailable(msg)| PublicationError::SigningUnavailable(msg))?;

    Ok(Publication {
        artist: artist.clone(),
        signature,
        serialized_snapshot: Bytes::from(serialized),
    })
}

/// Verify a publication and recover its snapshot.
///
/// Three checks, strictly ordered: the signature must verify over the
/// serialized bytes, the sealed signer must match the artist identity the
/// envelope claims (when it claims one), and only then are the bytes
/// decoded.
pub async fn verify_publication<O: Signer + ?Sized>(
    oracle: &O,
    publication: &Publication,
) -> Result<CatalogSnapshot, PublicationError> {
    let identity = oracle
        .verify(&publication.serialized_snapshot, &publication.signature)
        .await
        .map_err(|SignerError::Unavailable(msg)| PublicationError::SigningUnavailable(msg))?;

    if !identity.valid {
        return Err(PublicationError::InvalidSignature);
    }

    if let Some(claimed) = &publication.artist.pubkey {
        if claimed != &identity.pubkey {
            return Err(PublicationError::IdentityMismatch);
        }
    }

    artel_core::decode_snapshot(&publication.serialized_snapshot).map_err(|e| match e {
        CoreError::MalformedSnapshot(msg) => PublicationError::MalformedSnapshot(msg),
        CoreError::UnsupportedVersion(v) => {
            PublicationError::MalformedSnapshot(format!("unsupported snapshot version {}", v))
        }
        other => PublicationError::MalformedSnapshot(other.to_string()),
    })
}
