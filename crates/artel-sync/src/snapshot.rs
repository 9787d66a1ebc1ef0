//! Catalog snapshot assembly.
//!
//! Reads the store through the [`CatalogStore`] trait and produces a
//! [`CatalogSnapshot`] scoped by a [`CatalogFilter`]. Storage errors
//! propagate verbatim; the builder never returns a partial snapshot.

use artel_core::{CatalogFilter, CatalogSnapshot};
use artel_store::CatalogStore;

use crate::error::Result;

/// Build a snapshot of the store's catalog, scoped by `filter`.
///
/// Albums are included when their artist matches; a track filter narrows
/// tracks and albums to the ones the track id addresses. Peers are shared
/// only in unscoped snapshots, so a filtered publication stays within the
/// requested namespace.
pub async fn build_snapshot<S>(store: &S, filter: &CatalogFilter) -> Result<CatalogSnapshot>
where
    S: CatalogStore + ?Sized,
{
    let mut artists = store.list_artists(filter.since).await?;
    let mut albums = store.list_albums(filter.since).await?;
    let mut tracks = store.list_tracks(filter.since).await?;

    if let Some(artist_id) = &filter.artist_id {
        artists.retain(|a| &a.artist_id == artist_id);
        albums.retain(|a| &a.artist_id == artist_id);
        tracks.retain(|t| &t.artist_id == artist_id);
    }

    if let Some(track_id) = &filter.artist_track_id {
        tracks.retain(|t| &t.artist_track_id == track_id);
        albums.retain(|a| Some(a.artist_album_id.as_str()) == track_id.album_part());
    }

    let peers = if filter.artist_id.is_none() && filter.artist_track_id.is_none() {
        store.get_peers().await?
    } else {
        Vec::new()
    };

    Ok(CatalogSnapshot::new(artists, albums, tracks, peers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use artel_core::{Album, AlbumId, Artist, ArtistId, Keypair, Peer, Track, TrackId};
    use artel_store::MemoryStore;

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();

        let alice = ArtistId::parse("aliceinchains").unwrap();
        let sound = ArtistId::parse("soundgarden").unwrap();

        store
            .store_artist(&Artist {
                artist_id: alice.clone(),
                name: "Alice In Chains".into(),
                pubkey: None,
            })
            .await
            .unwrap();
        store
            .store_artist(&Artist {
                artist_id: sound.clone(),
                name: "Soundgarden".into(),
                pubkey: None,
            })
            .await
            .unwrap();

        let dirt = AlbumId::parse("dirt").unwrap();
        store
            .store_album(&Album {
                artist_id: alice.clone(),
                artist_album_id: dirt.clone(),
                title: "Dirt".into(),
                tracks: vec![
                    TrackId::parse("dirt/thembones").unwrap(),
                    TrackId::parse("dirt/would").unwrap(),
                ],
            })
            .await
            .unwrap();

        store
            .store_track(&Track {
                artist_id: alice.clone(),
                artist_album_id: Some(dirt.clone()),
                artist_track_id: TrackId::parse("dirt/would").unwrap(),
                album_track_number: 12,
                title: "Would?".into(),
            })
            .await
            .unwrap();
        store
            .store_track(&Track {
                artist_id: alice.clone(),
                artist_album_id: Some(dirt),
                artist_track_id: TrackId::parse("dirt/thembones").unwrap(),
                album_track_number: 1,
                title: "Them Bones".into(),
            })
            .await
            .unwrap();
        store
            .store_track(&Track {
                artist_id: sound,
                artist_album_id: None,
                artist_track_id: TrackId::parse("spoonman").unwrap(),
                album_track_number: 0,
                title: "Spoonman".into(),
            })
            .await
            .unwrap();

        store
            .store_peer(&Peer {
                pubkey: Keypair::from_seed(&[9; 32]).public_key(),
                host: "peer.example.onion".into(),
                port: 53545,
            })
            .await
            .unwrap();

        store
    }

    #[tokio::test]
    async fn test_unfiltered_snapshot_includes_everything() {
        let store = seeded_store().await;
        let snap = build_snapshot(&store, &CatalogFilter::all()).await.unwrap();

        assert_eq!(snap.artists.len(), 2);
        assert_eq!(snap.albums.len(), 1);
        assert_eq!(snap.tracks.len(), 3);
        assert_eq!(snap.peers.len(), 1);
    }

    #[tokio::test]
    async fn test_artist_filter_scopes_subtree() {
        let store = seeded_store().await;
        let filter = CatalogFilter::for_artist(ArtistId::parse("aliceinchains").unwrap());
        let snap = build_snapshot(&store, &filter).await.unwrap();

        assert_eq!(snap.artists.len(), 1);
        assert_eq!(snap.artists[0].artist_id.as_str(), "aliceinchains");
        assert_eq!(snap.albums.len(), 1);
        assert_eq!(snap.tracks.len(), 2);
        assert!(snap.peers.is_empty());
    }

    #[tokio::test]
    async fn test_track_filter_narrows_to_addressed_entities() {
        let store = seeded_store().await;
        let filter = CatalogFilter::for_track(
            ArtistId::parse("aliceinchains").unwrap(),
            TrackId::parse("dirt/would").unwrap(),
        );
        let snap = build_snapshot(&store, &filter).await.unwrap();

        assert_eq!(snap.tracks.len(), 1);
        assert_eq!(snap.tracks[0].artist_track_id.as_str(), "dirt/would");
        assert_eq!(snap.albums.len(), 1);
        assert_eq!(snap.albums[0].artist_album_id.as_str(), "dirt");
    }

    #[tokio::test]
    async fn test_since_in_the_future_yields_empty_catalog() {
        let store = seeded_store().await;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as i64;
        let snap = build_snapshot(&store, &CatalogFilter::modified_since(now + 60_000))
            .await
            .unwrap();

        assert!(snap.artists.is_empty());
        assert!(snap.albums.is_empty());
        assert!(snap.tracks.is_empty());
    }
}
