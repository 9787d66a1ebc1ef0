//! # Artel
//!
//! Peer-to-peer publication and sync of music catalogs.
//!
//! ## Overview
//!
//! An Artel node hosts one artist's catalog of albums and tracks, publishes
//! it as a signed, self-authenticating snapshot, serves it to peers, and
//! pulls peers' catalogs into its own store. There is no central registry:
//! a publication proves itself by its signature, and artist identity is
//! first-come-first-bound per artist id.
//!
//! ## Key Concepts
//!
//! - **Slug addressing**: every entity is addressed by a slug derived from
//!   its title, so republication never mints duplicates.
//! - **Publication**: a canonically-encoded catalog snapshot plus a sealed
//!   signature, append-only and content-addressed.
//! - **Sync**: request/response pull of a peer's publication, verified
//!   before a single byte of it is decoded.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use artel::{Node, NodeConfig};
//! use artel::core::Keypair;
//! use artel::store::SqliteStore;
//! use artel::sync::LocalSigner;
//!
//! async fn example() {
//!     let config = NodeConfig::for_artist("Alice In Chains");
//!     let store = SqliteStore::open("catalog.db").unwrap();
//!     let signer = LocalSigner::new(Keypair::generate());
//!
//!     let node = Node::new(config, store, signer).unwrap();
//!     node.register_artist().await.unwrap();
//!     node.add_track(Some("Dirt"), 12, "Would?", b"audio bytes")
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `artel::core` - entities, slugs, canonical encoding, crypto
//! - `artel::store` - storage abstraction and SQLite
//! - `artel::sync` - publication protocol, transport, client, service

pub mod config;
pub mod error;
pub mod node;

// Re-export component crates
pub use artel_core as core;
pub use artel_store as store;
pub use artel_sync as sync;

// Re-export main types for convenience
pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use node::Node;

// Re-export commonly used core types
pub use artel_core::{
    Album, AlbumId, Artist, ArtistId, CatalogFilter, CatalogSnapshot, Keypair, Peer, PublicKey,
    Publication, PublicationId, Track, TrackId,
};
