//! # Artel Sync
//!
//! The publication and sync protocol for Artel nodes.
//!
//! ## Overview
//!
//! A node publishes its catalog as a signed, canonically-encoded snapshot
//! and serves it to peers over a small request/response protocol. Peers
//! fetch, verify, and merge those publications; track payloads are fetched
//! lazily on demand.
//!
//! ## Key Types
//!
//! - [`Signer`] / [`LocalSigner`] - the signing oracle seam
//! - [`build_snapshot`] - assemble a filtered catalog snapshot
//! - [`sign_snapshot`] / [`verify_publication`] - the publication protocol
//! - [`WireMessage`] - the wire protocol messages
//! - [`Channel`] - transport seam, with memory and TCP implementations
//! - [`SyncClient`] - fetch, verify, merge
//! - [`SyncService`] - serve the local catalog
//!
//! ## Trust model
//!
//! Verification never trusts the transport: a publication proves itself via
//! its sealed signature, and a snapshot is only decoded after the signature
//! is proven valid. Artist identity is first-writer-wins per artist id;
//! conflicting claims are reported, not resolved.

pub mod client;
pub mod error;
pub mod messages;
pub mod publish;
pub mod service;
pub mod signer;
pub mod snapshot;
pub mod transport;

pub use client::{merge_snapshot, IdentityConflict, SyncClient, SyncConfig, SyncReport};
pub use error::{Result, SyncError};
pub use messages::{WireErrorCode, WireMessage, PROTOCOL_VERSION};
pub use publish::{sign_snapshot, verify_publication, PublicationError};
pub use service::SyncService;
pub use signer::{LocalSigner, Signer, SignerError, VerifiedIdentity};
pub use snapshot::build_snapshot;
pub use transport::{memory, tcp, Channel};
