//! In-memory implementation of the CatalogStore trait.
//!
//! Primarily for tests. Same semantics as SQLite but nothing persists past
//! the store's lifetime. Thread-safe via RwLock.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use artel_core::{
    Album, AlbumId, Artist, ArtistId, Peer, Publication, PublicationId, PublicKey, Track, TrackId,
};

use crate::error::{Result, StoreError};
use crate::traits::{CatalogStore, InsertOutcome};

struct Stamped<T> {
    value: T,
    updated_at: i64,
}

#[derive(Default)]
struct MemoryStoreInner {
    artists: BTreeMap<ArtistId, Stamped<Artist>>,
    albums: BTreeMap<(ArtistId, AlbumId), Stamped<Album>>,
    tracks: BTreeMap<(ArtistId, TrackId), Stamped<Track>>,
    payloads: BTreeMap<(ArtistId, TrackId), Vec<u8>>,
    peers: BTreeMap<PublicKey, Peer>,
    publications: Vec<Publication>,
    publication_ids: HashSet<PublicationId>,
}

/// In-memory catalog store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {}", e)))
    }
}

/// Upsert preserving the stamp when the stored value is unchanged.
fn upsert<K: Ord, T: PartialEq + Clone>(
    map: &mut BTreeMap<K, Stamped<T>>,
    key: K,
    value: &T,
) {
    match map.get_mut(&key) {
        Some(existing) if existing.value == *value => {}
        Some(existing) => {
            existing.value = value.clone();
            existing.updated_at = now_millis();
        }
        None => {
            map.insert(
                key,
                Stamped {
                    value: value.clone(),
                    updated_at: now_millis(),
                },
            );
        }
    }
}

fn list_since<'a, T: Clone + 'a>(
    values: impl Iterator<Item = &'a Stamped<T>>,
    since: Option<i64>,
) -> Vec<T> {
    values
        .filter(|s| since.map_or(true, |t| s.updated_at >= t))
        .map(|s| s.value.clone())
        .collect()
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_artist(&self, artist_id: &ArtistId) -> Result<Option<Artist>> {
        Ok(self.read()?.artists.get(artist_id).map(|s| s.value.clone()))
    }

    async fn store_artist(&self, artist: &Artist) -> Result<()> {
        let mut inner = self.write()?;
        upsert(&mut inner.artists, artist.artist_id.clone(), artist);
        Ok(())
    }

    async fn list_artists(&self, since: Option<i64>) -> Result<Vec<Artist>> {
        Ok(list_since(self.read()?.artists.values(), since))
    }

    async fn get_album(
        &self,
        artist_id: &ArtistId,
        album_id: &AlbumId,
    ) -> Result<Option<Album>> {
        Ok(self
            .read()?
            .albums
            .get(&(artist_id.clone(), album_id.clone()))
            .map(|s| s.value.clone()))
    }

    async fn store_album(&self, album: &Album) -> Result<()> {
        let mut inner = self.write()?;
        let key = (album.artist_id.clone(), album.artist_album_id.clone());
        upsert(&mut inner.albums, key, album);
        Ok(())
    }

    async fn list_albums(&self, since: Option<i64>) -> Result<Vec<Album>> {
        Ok(list_since(self.read()?.albums.values(), since))
    }

    async fn get_track(
        &self,
        artist_id: &ArtistId,
        track_id: &TrackId,
    ) -> Result<Option<Track>> {
        Ok(self
            .read()?
            .tracks
            .get(&(artist_id.clone(), track_id.clone()))
            .map(|s| s.value.clone()))
    }

    async fn store_track(&self, track: &Track) -> Result<()> {
        let mut inner = self.write()?;
        let key = (track.artist_id.clone(), track.artist_track_id.clone());
        upsert(&mut inner.tracks, key, track);
        Ok(())
    }

    async fn list_tracks(&self, since: Option<i64>) -> Result<Vec<Track>> {
        Ok(list_since(self.read()?.tracks.values(), since))
    }

    async fn store_track_payload(
        &self,
        artist_id: &ArtistId,
        track_id: &TrackId,
        payload: &[u8],
    ) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .payloads
            .insert((artist_id.clone(), track_id.clone()), payload.to_vec());
        Ok(())
    }

    async fn get_track_payload(
        &self,
        artist_id: &ArtistId,
        track_id: &TrackId,
    ) -> Result<Option<Vec<u8>>> {
        Ok(self
            .read()?
            .payloads
            .get(&(artist_id.clone(), track_id.clone()))
            .cloned())
    }

    async fn get_peers(&self) -> Result<Vec<Peer>> {
        Ok(self.read()?.peers.values().cloned().collect())
    }

    async fn store_peer(&self, peer: &Peer) -> Result<()> {
        let mut inner = self.write()?;
        inner.peers.insert(peer.pubkey, peer.clone());
        Ok(())
    }

    async fn store_publication(&self, publication: &Publication) -> Result<InsertOutcome> {
        let mut inner = self.write()?;
        let id = publication.compute_id();
        if !inner.publication_ids.insert(id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        inner.publications.push(publication.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn latest_publication(&self, artist_id: &ArtistId) -> Result<Option<Publication>> {
        Ok(self
            .read()?
            .publications
            .iter()
            .rev()
            .find(|p| p.artist.artist_id == *artist_id)
            .cloned())
    }

    async fn get_publication(&self, id: &PublicationId) -> Result<Option<Publication>> {
        Ok(self
            .read()?
            .publications
            .iter()
            .find(|p| p.compute_id() == *id)
            .cloned())
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(id: &str, name: &str) -> Artist {
        Artist {
            artist_id: ArtistId::parse(id).unwrap(),
            name: name.into(),
            pubkey: None,
        }
    }

    #[tokio::test]
    async fn test_artist_roundtrip() {
        let store = MemoryStore::new();
        let a = artist("aliceinchains", "Alice In Chains");
        store.store_artist(&a).await.unwrap();

        let got = store.get_artist(&a.artist_id).await.unwrap().unwrap();
        assert_eq!(got, a);

        let missing = ArtistId::parse("nobody").unwrap();
        assert!(store.get_artist(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unchanged_upsert_keeps_timestamp() {
        let store = MemoryStore::new();
        let a = artist("aliceinchains", "Alice In Chains");
        store.store_artist(&a).await.unwrap();
        let stamp = store.read().unwrap().artists[&a.artist_id].updated_at;

        store.store_artist(&a).await.unwrap();
        assert_eq!(
            store.read().unwrap().artists[&a.artist_id].updated_at,
            stamp
        );
    }

    #[tokio::test]
    async fn test_list_artists_since() {
        let store = MemoryStore::new();
        store
            .store_artist(&artist("aliceinchains", "Alice In Chains"))
            .await
            .unwrap();
        let all = store.list_artists(None).await.unwrap();
        assert_eq!(all.len(), 1);

        let future = now_millis() + 60_000;
        let none = store.list_artists(Some(future)).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_track_payload_roundtrip() {
        let store = MemoryStore::new();
        let artist_id = ArtistId::parse("aliceinchains").unwrap();
        let track_id = TrackId::parse("dirt/would").unwrap();
        store
            .store_track_payload(&artist_id, &track_id, b"mp3 bytes")
            .await
            .unwrap();
        let payload = store
            .get_track_payload(&artist_id, &track_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload, b"mp3 bytes");
    }

    #[tokio::test]
    async fn test_peer_upsert_by_pubkey() {
        let store = MemoryStore::new();
        let pubkey = artel_core::Keypair::from_seed(&[1; 32]).public_key();
        let peer = Peer {
            pubkey,
            host: "a.example".into(),
            port: 1,
        };
        store.store_peer(&peer).await.unwrap();
        let moved = Peer {
            pubkey,
            host: "b.example".into(),
            port: 2,
        };
        store.store_peer(&moved).await.unwrap();

        let peers = store.get_peers().await.unwrap();
        assert_eq!(peers, vec![moved]);
    }
}
