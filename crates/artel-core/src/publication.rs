//! The signed publication envelope.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::catalog::Artist;
use crate::crypto::CatalogSignature;

/// Content address of a publication: blake3 over the signed snapshot bytes
/// followed by the sealed signature. Two identical publications share an id,
/// which is what makes storing them append-only yet idempotent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicationId(pub [u8; 32]);

impl PublicationId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PublicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicationId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PublicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// A signed envelope wrapping a serialized catalog snapshot.
///
/// `serialized_snapshot` is the exact byte sequence that was signed; the
/// signature is only meaningful over those exact bytes. The snapshot is never
/// deserialized from this envelope until the signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    /// The artist claiming authorship of the snapshot.
    pub artist: Artist,
    /// Sealed signature over `serialized_snapshot`.
    pub signature: CatalogSignature,
    /// Canonical snapshot bytes, exactly as signed.
    pub serialized_snapshot: Bytes,
}

impl Publication {
    /// Compute the content address of this publication.
    pub fn compute_id(&self) -> PublicationId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.serialized_snapshot);
        hasher.update(&self.signature.to_bytes());
        PublicationId(*hasher.finalize().as_bytes())
    }
}
