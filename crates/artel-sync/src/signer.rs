//! The signing oracle seam.
//!
//! A node never holds key material directly; everything that needs a
//! signature goes through the [`Signer`] trait. [`LocalSigner`] wraps an
//! in-process keypair. A remote key holder would implement the same trait
//! over whatever transport it uses, which is why the methods are async and
//! fallible even though the local case cannot fail.

use async_trait::async_trait;
use thiserror::Error;

use artel_core::{CatalogSignature, Keypair, PublicKey};

/// Errors from the signing oracle.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The key holder could not be reached. Not retried at this layer.
    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

/// Who signed a message, and whether the signature holds.
///
/// The pubkey is the signer sealed inside the signature envelope; `valid`
/// reports the Ed25519 check of the signature over the message under that
/// key. Callers decide separately whether that signer is the identity they
/// expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub pubkey: PublicKey,
    pub valid: bool,
}

/// Interface to a signing identity.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign a message, sealing the signer's identity into the result.
    async fn sign(&self, message: &[u8]) -> Result<CatalogSignature, SignerError>;

    /// Check a sealed signature against a message.
    async fn verify(
        &self,
        message: &[u8],
        signature: &CatalogSignature,
    ) -> Result<VerifiedIdentity, SignerError>;

    /// The public key this oracle signs as.
    fn identity(&self) -> PublicKey;
}

/// A signer backed by an in-process keypair.
pub struct LocalSigner {
    keypair: Keypair,
}

impl LocalSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }
}

#[async_trait]
impl Signer for LocalSigner {
    async fn sign(&self, message: &[u8]) -> Result<CatalogSignature, SignerError> {
        Ok(self.keypair.sign(message))
    }

    async fn verify(
        &self,
        message: &[u8],
        signature: &CatalogSignature,
    ) -> Result<VerifiedIdentity, SignerError> {
        let valid = signature
            .signer
            .verify(message, &signature.signature)
            .is_ok();
        Ok(VerifiedIdentity {
            pubkey: signature.signer,
            valid,
        })
    }

    fn identity(&self) -> PublicKey {
        self.keypair.public_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_verify_roundtrip() {
        let signer = LocalSigner::new(Keypair::from_seed(&[1; 32]));
        let sig = signer.sign(b"catalog bytes").await.unwrap();

        let identity = signer.verify(b"catalog bytes", &sig).await.unwrap();
        assert!(identity.valid);
        assert_eq!(identity.pubkey, signer.identity());
    }

    #[tokio::test]
    async fn test_verify_reports_sealed_signer_not_local_identity() {
        let alice = LocalSigner::new(Keypair::from_seed(&[1; 32]));
        let bob = LocalSigner::new(Keypair::from_seed(&[2; 32]));

        let sig = alice.sign(b"message").await.unwrap();

        // Bob's oracle still reports Alice as the signer.
        let identity = bob.verify(b"message", &sig).await.unwrap();
        assert!(identity.valid);
        assert_eq!(identity.pubkey, alice.identity());
    }

    #[tokio::test]
    async fn test_tampered_message_invalid() {
        let signer = LocalSigner::new(Keypair::from_seed(&[1; 32]));
        let sig = signer.sign(b"original").await.unwrap();

        let identity = signer.verify(b"tampered", &sig).await.unwrap();
        assert!(!identity.valid);
        assert_eq!(identity.pubkey, signer.identity());
    }
}
