//! # Artel Store
//!
//! Storage abstraction for Artel nodes. Provides a trait-based interface
//! for catalog persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts catalog storage behind the [`CatalogStore`]
//! trait, allowing the node to be storage-agnostic. The primary
//! implementation is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`CatalogStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertOutcome`] - Result of appending a publication
//!
//! ## Usage
//!
//! ```rust,no_run
//! use artel_store::{CatalogStore, SqliteStore};
//! use artel_core::ArtistId;
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("catalog.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let artist_id = ArtistId::parse("aliceinchains").unwrap();
//!     let artist = store.get_artist(&artist_id).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Tagged absence**: Lookups return `Ok(None)` for missing entities
//! - **Idempotent upserts**: Storing an unchanged value leaves the local
//!   modification time untouched
//! - **Append-only publications**: Storing the same publication twice
//!   returns `AlreadyExists`
//! - **Local modification times**: Used only for since-filters; never
//!   serialized into snapshots

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CatalogStore, InsertOutcome};
