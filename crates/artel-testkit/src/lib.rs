//! # Artel Testkit
//!
//! Testing utilities for Artel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up catalog test scenarios
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use artel_testkit::generators::catalog_snapshot;
//! use artel_core::{decode_snapshot, snapshot_bytes};
//!
//! proptest! {
//!     #[test]
//!     fn snapshots_roundtrip(snapshot in catalog_snapshot()) {
//!         let bytes = snapshot_bytes(&snapshot);
//!         prop_assert_eq!(decode_snapshot(&bytes).unwrap(), snapshot);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust,ignore
//! use artel_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! fixture.seed_alice().await.unwrap();
//! let snapshot = fixture.snapshot().await.unwrap();
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{multi_party_fixtures, TestFixture};
