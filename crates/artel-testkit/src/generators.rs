//! Proptest generators for property-based testing.

use proptest::prelude::*;

use artel_core::{
    Album, AlbumId, Artist, ArtistId, CatalogSnapshot, Keypair, Peer, PublicKey, Track, TrackId,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random public key.
pub fn public_key() -> impl Strategy<Value = PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a bare slug.
pub fn slug() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,24}".prop_map(String::from)
}

/// Generate an artist id.
pub fn artist_id() -> impl Strategy<Value = ArtistId> {
    slug().prop_map(|s| ArtistId::parse(&s).unwrap())
}

/// Generate an album id.
pub fn album_id() -> impl Strategy<Value = AlbumId> {
    slug().prop_map(|s| AlbumId::parse(&s).unwrap())
}

/// Generate a track id, singleton or album-scoped.
pub fn track_id() -> impl Strategy<Value = TrackId> {
    prop_oneof![
        slug().prop_map(|s| TrackId::parse(&s).unwrap()),
        (slug(), slug()).prop_map(|(album, leaf)| {
            TrackId::parse(&format!("{}/{}", album, leaf)).unwrap()
        }),
    ]
}

/// Generate a display title.
pub fn title() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 '!?.,-]{1,32}".prop_map(String::from)
}

/// Generate an artist, with or without a bound identity.
pub fn artist() -> impl Strategy<Value = Artist> {
    (artist_id(), title(), prop::option::of(public_key())).prop_map(
        |(artist_id, name, pubkey)| Artist {
            artist_id,
            name,
            pubkey,
        },
    )
}

/// Generate an album within the given artist's namespace.
pub fn album_for(owner: ArtistId) -> impl Strategy<Value = Album> {
    (album_id(), title(), prop::collection::vec(track_id(), 0..6)).prop_map(
        move |(artist_album_id, title, tracks)| Album {
            artist_id: owner.clone(),
            artist_album_id,
            title,
            tracks,
        },
    )
}

/// Generate a track within the given artist's namespace.
pub fn track_for(owner: ArtistId) -> impl Strategy<Value = Track> {
    (track_id(), 0u32..=20, title()).prop_map(move |(artist_track_id, number, title)| {
        let artist_album_id = artist_track_id
            .album_part()
            .map(|album| AlbumId::parse(album).unwrap());
        Track {
            artist_id: owner.clone(),
            artist_album_id,
            artist_track_id,
            album_track_number: number,
            title,
        }
    })
}

/// Generate a peer entry.
pub fn peer() -> impl Strategy<Value = Peer> {
    (public_key(), "[a-z0-9.]{4,32}", 1u16..=u16::MAX).prop_map(|(pubkey, host, port)| Peer {
        pubkey,
        host,
        port,
    })
}

/// Generate a whole catalog snapshot.
///
/// Albums and tracks are drawn within the generated artists' namespaces and
/// deduplicated by natural key, so the result is a valid snapshot.
pub fn catalog_snapshot() -> impl Strategy<Value = CatalogSnapshot> {
    (
        prop::collection::vec(artist(), 0..4),
        prop::collection::vec(peer(), 0..3),
    )
        .prop_flat_map(|(artists, peers)| {
            let owners: Vec<ArtistId> = artists.iter().map(|a| a.artist_id.clone()).collect();
            let albums = if owners.is_empty() {
                Just(Vec::new()).boxed()
            } else {
                prop::collection::vec(
                    prop::sample::select(owners.clone()).prop_flat_map(album_for),
                    0..4,
                )
                .boxed()
            };
            let tracks = if owners.is_empty() {
                Just(Vec::new()).boxed()
            } else {
                prop::collection::vec(
                    prop::sample::select(owners).prop_flat_map(track_for),
                    0..6,
                )
                .boxed()
            };
            (Just(artists), albums, tracks, Just(peers))
        })
        .prop_map(|(mut artists, mut albums, mut tracks, mut peers)| {
            artists.sort_by(|a, b| a.artist_id.cmp(&b.artist_id));
            artists.dedup_by(|a, b| a.artist_id == b.artist_id);
            albums.sort_by(|a, b| {
                (&a.artist_id, &a.artist_album_id).cmp(&(&b.artist_id, &b.artist_album_id))
            });
            albums.dedup_by(|a, b| {
                a.artist_id == b.artist_id && a.artist_album_id == b.artist_album_id
            });
            tracks.sort_by(|a, b| {
                (&a.artist_id, &a.artist_track_id).cmp(&(&b.artist_id, &b.artist_track_id))
            });
            tracks.dedup_by(|a, b| {
                a.artist_id == b.artist_id && a.artist_track_id == b.artist_track_id
            });
            peers.sort_by(|a, b| a.pubkey.cmp(&b.pubkey));
            peers.dedup_by(|a, b| a.pubkey == b.pubkey);
            CatalogSnapshot::new(artists, albums, tracks, peers)
        })
}
