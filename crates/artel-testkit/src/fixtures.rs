//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use artel_core::{
    Album, AlbumId, Artist, ArtistId, CatalogSnapshot, Keypair, Peer, Track, TrackId,
};
use artel_store::{CatalogStore, MemoryStore};
use artel_sync::LocalSigner;

/// A test fixture with a signing identity and a memory store.
pub struct TestFixture {
    pub keypair: Keypair,
    pub store: MemoryStore,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair.
    pub fn new() -> Self {
        Self {
            keypair: Keypair::generate(),
            store: MemoryStore::new(),
        }
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
            store: MemoryStore::new(),
        }
    }

    /// Get the fixture's public key.
    pub fn public_key(&self) -> artel_core::PublicKey {
        self.keypair.public_key()
    }

    /// A signer over the fixture's keypair.
    pub fn signer(&self) -> LocalSigner {
        LocalSigner::new(self.keypair.clone())
    }

    /// Seed the store with the canonical "Alice In Chains" catalog: artist
    /// bound to the fixture's key, album "Dirt", track "Would?" filed as
    /// `dirt/would` with a payload.
    pub async fn seed_alice(&self) -> Artist {
        let artist = Artist {
            artist_id: ArtistId::parse("aliceinchains").unwrap(),
            name: "Alice In Chains".into(),
            pubkey: Some(self.public_key()),
        };
        self.store.store_artist(&artist).await.unwrap();

        let album_id = AlbumId::parse("dirt").unwrap();
        let track_id = TrackId::parse("dirt/would").unwrap();

        self.store
            .store_album(&Album {
                artist_id: artist.artist_id.clone(),
                artist_album_id: album_id.clone(),
                title: "Dirt".into(),
                tracks: vec![track_id.clone()],
            })
            .await
            .unwrap();
        self.store
            .store_track(&Track {
                artist_id: artist.artist_id.clone(),
                artist_album_id: Some(album_id),
                artist_track_id: track_id.clone(),
                album_track_number: 12,
                title: "Would?".into(),
            })
            .await
            .unwrap();
        self.store
            .store_track_payload(&artist.artist_id, &track_id, b"audio bytes")
            .await
            .unwrap();

        artist
    }

    /// Add a peer entry pointing at `host:port` with the given identity.
    pub async fn seed_peer(&self, pubkey: artel_core::PublicKey, host: &str, port: u16) -> Peer {
        let peer = Peer {
            pubkey,
            host: host.into(),
            port,
        };
        self.store.store_peer(&peer).await.unwrap();
        peer
    }

    /// Snapshot of everything currently in the fixture's store.
    pub async fn snapshot(&self) -> CatalogSnapshot {
        artel_sync::build_snapshot(&self.store, &artel_core::CatalogFilter::all())
            .await
            .unwrap()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create multiple test fixtures for multi-party tests.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| TestFixture::with_seed([i as u8 + 1; 32]))
        .collect()
}
