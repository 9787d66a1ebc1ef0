//! # Artel Core
//!
//! Pure primitives for the Artel catalog network: entities, slug addressing,
//! canonical encoding, and the signed publication envelope.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over catalog data structures.
//!
//! ## Key Types
//!
//! - [`Artist`], [`Album`], [`Track`], [`Peer`] - catalog entities
//! - [`ArtistId`], [`AlbumId`], [`TrackId`] - slug-derived natural keys
//! - [`CatalogSnapshot`] - the aggregate that gets signed and exchanged
//! - [`Publication`] - a snapshot sealed with its author's signature
//!
//! ## Canonicalization
//!
//! Snapshots are encoded with deterministic CBOR so that an unchanged catalog
//! always serializes to the same bytes. See [`canonical`].

pub mod canonical;
pub mod catalog;
pub mod crypto;
pub mod error;
pub mod publication;
pub mod slug;

pub use canonical::{decode_snapshot, snapshot_bytes, SNAPSHOT_VERSION};
pub use catalog::{Album, Artist, CatalogFilter, CatalogSnapshot, Peer, Track};
pub use crypto::{CatalogSignature, Keypair, PublicKey, Signature};
pub use error::CoreError;
pub use publication::{Publication, PublicationId};
pub use slug::{slugify, AlbumId, ArtistId, TrackId};
