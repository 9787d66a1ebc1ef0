//! Canonical CBOR encoding for catalog snapshots.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Integer map keys, written in ascending order
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - Collections ordered by natural key
//! - No floats
//!
//! The canonical encoding is what gets signed: two builds of an unchanged
//! catalog must produce byte-identical output, or signatures would not be
//! stable across republication.

use ciborium::value::Value;

use crate::catalog::{Album, Artist, CatalogSnapshot, Peer, Track};
use crate::crypto::PublicKey;
use crate::error::CoreError;
use crate::slug::{AlbumId, ArtistId, TrackId};

/// Snapshot wire format version. Bump on any schema change.
pub const SNAPSHOT_VERSION: u64 = 1;

/// Field keys for the top-level snapshot map.
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const VERSION: u64 = 0;
    pub const ARTISTS: u64 = 1;
    pub const ALBUMS: u64 = 2;
    pub const TRACKS: u64 = 3;
    pub const PEERS: u64 = 4;

    pub mod artist {
        pub const ID: u64 = 0;
        pub const NAME: u64 = 1;
        pub const PUBKEY: u64 = 2;
    }

    pub mod album {
        pub const ARTIST_ID: u64 = 0;
        pub const ID: u64 = 1;
        pub const TITLE: u64 = 2;
        pub const TRACKS: u64 = 3;
    }

    pub mod track {
        pub const ARTIST_ID: u64 = 0;
        pub const ALBUM_ID: u64 = 1;
        pub const ID: u64 = 2;
        pub const NUMBER: u64 = 3;
        pub const TITLE: u64 = 4;
    }

    pub mod peer {
        pub const PUBKEY: u64 = 0;
        pub const HOST: u64 = 1;
        pub const PORT: u64 = 2;
    }
}

/// Encode a snapshot to canonical bytes.
///
/// Collections are re-sorted by natural key before encoding, so the output
/// does not depend on the order entities were assembled in.
pub fn snapshot_bytes(snapshot: &CatalogSnapshot) -> Vec<u8> {
    let mut artists: Vec<&Artist> = snapshot.artists.iter().collect();
    artists.sort_by(|a, b| a.artist_id.cmp(&b.artist_id));
    let mut albums: Vec<&Album> = snapshot.albums.iter().collect();
    albums.sort_by(|a, b| {
        (&a.artist_id, &a.artist_album_id).cmp(&(&b.artist_id, &b.artist_album_id))
    });
    let mut tracks: Vec<&Track> = snapshot.tracks.iter().collect();
    tracks.sort_by(|a, b| {
        (&a.artist_id, &a.artist_track_id).cmp(&(&b.artist_id, &b.artist_track_id))
    });
    let mut peers: Vec<&Peer> = snapshot.peers.iter().collect();
    peers.sort_by(|a, b| a.pubkey.cmp(&b.pubkey));

    let mut buf = Vec::new();
    encode_map_header(&mut buf, 5);

    encode_uint(&mut buf, 0, keys::VERSION);
    encode_uint(&mut buf, 0, SNAPSHOT_VERSION);

    encode_uint(&mut buf, 0, keys::ARTISTS);
    encode_array_header(&mut buf, artists.len());
    for artist in artists {
        encode_artist(&mut buf, artist);
    }

    encode_uint(&mut buf, 0, keys::ALBUMS);
    encode_array_header(&mut buf, albums.len());
    for album in albums {
        encode_album(&mut buf, album);
    }

    encode_uint(&mut buf, 0, keys::TRACKS);
    encode_array_header(&mut buf, tracks.len());
    for track in tracks {
        encode_track(&mut buf, track);
    }

    encode_uint(&mut buf, 0, keys::PEERS);
    encode_array_header(&mut buf, peers.len());
    for peer in peers {
        encode_peer(&mut buf, peer);
    }

    buf
}

fn encode_artist(buf: &mut Vec<u8>, artist: &Artist) {
    encode_map_header(buf, 3);
    encode_uint(buf, 0, keys::artist::ID);
    encode_text(buf, artist.artist_id.as_str());
    encode_uint(buf, 0, keys::artist::NAME);
    encode_text(buf, &artist.name);
    encode_uint(buf, 0, keys::artist::PUBKEY);
    match &artist.pubkey {
        Some(pk) => encode_bytes(buf, pk.as_bytes()),
        None => buf.push(0xf6),
    }
}

fn encode_album(buf: &mut Vec<u8>, album: &Album) {
    encode_map_header(buf, 4);
    encode_uint(buf, 0, keys::album::ARTIST_ID);
    encode_text(buf, album.artist_id.as_str());
    encode_uint(buf, 0, keys::album::ID);
    encode_text(buf, album.artist_album_id.as_str());
    encode_uint(buf, 0, keys::album::TITLE);
    encode_text(buf, &album.title);
    encode_uint(buf, 0, keys::album::TRACKS);
    encode_array_header(buf, album.tracks.len());
    for track_id in &album.tracks {
        encode_text(buf, track_id.as_str());
    }
}

fn encode_track(buf: &mut Vec<u8>, track: &Track) {
    encode_map_header(buf, 5);
    encode_uint(buf, 0, keys::track::ARTIST_ID);
    encode_text(buf, track.artist_id.as_str());
    encode_uint(buf, 0, keys::track::ALBUM_ID);
    match &track.artist_album_id {
        Some(album) => encode_text(buf, album.as_str()),
        None => buf.push(0xf6),
    }
    encode_uint(buf, 0, keys::track::ID);
    encode_text(buf, track.artist_track_id.as_str());
    encode_uint(buf, 0, keys::track::NUMBER);
    encode_uint(buf, 0, u64::from(track.album_track_number));
    encode_uint(buf, 0, keys::track::TITLE);
    encode_text(buf, &track.title);
}

fn encode_peer(buf: &mut Vec<u8>, peer: &Peer) {
    encode_map_header(buf, 3);
    encode_uint(buf, 0, keys::peer::PUBKEY);
    encode_bytes(buf, peer.pubkey.as_bytes());
    encode_uint(buf, 0, keys::peer::HOST);
    encode_text(buf, &peer.host);
    encode_uint(buf, 0, keys::peer::PORT);
    encode_uint(buf, 0, u64::from(peer.port));
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array header (major type 4).
fn encode_array_header(buf: &mut Vec<u8>, len: usize) {
    encode_uint(buf, 4, len as u64);
}

/// Encode a map header (major type 5). Entries must follow in ascending
/// integer-key order for the output to be canonical.
fn encode_map_header(buf: &mut Vec<u8>, len: usize) {
    encode_uint(buf, 5, len as u64);
}

/// Decode a snapshot from its canonical bytes.
///
/// Rejects unknown versions and any entity whose identifier is not in slug
/// form; the result is re-sorted, so decoding accepts semantically valid
/// snapshots even if a non-canonical encoder produced them.
pub fn decode_snapshot(bytes: &[u8]) -> Result<CatalogSnapshot, CoreError> {
    let value: Value = ciborium::from_reader(bytes)
        .map_err(|e| CoreError::DecodingError(e.to_string()))?;

    let map = as_map(&value, "snapshot")?;

    let version = match get(map, keys::VERSION) {
        Some(v) => as_uint(v, "version")?,
        None => return Err(CoreError::MalformedSnapshot("missing version".into())),
    };
    if version != SNAPSHOT_VERSION {
        return Err(CoreError::UnsupportedVersion(version));
    }

    let mut artists = Vec::new();
    for item in get_array(map, keys::ARTISTS, "artists")? {
        artists.push(decode_artist(item)?);
    }
    let mut albums = Vec::new();
    for item in get_array(map, keys::ALBUMS, "albums")? {
        albums.push(decode_album(item)?);
    }
    let mut tracks = Vec::new();
    for item in get_array(map, keys::TRACKS, "tracks")? {
        tracks.push(decode_track(item)?);
    }
    let mut peers = Vec::new();
    for item in get_array(map, keys::PEERS, "peers")? {
        peers.push(decode_peer(item)?);
    }

    Ok(CatalogSnapshot::new(artists, albums, tracks, peers))
}

fn decode_artist(value: &Value) -> Result<Artist, CoreError> {
    let map = as_map(value, "artist")?;
    let artist_id = ArtistId::parse(&get_text(map, keys::artist::ID, "artist id")?)
        .map_err(|e| CoreError::MalformedSnapshot(e.to_string()))?;
    let name = get_text(map, keys::artist::NAME, "artist name")?;
    let pubkey = match get(map, keys::artist::PUBKEY) {
        Some(Value::Bytes(b)) => Some(decode_pubkey(b, "artist pubkey")?),
        Some(Value::Null) | None => None,
        Some(_) => return Err(CoreError::MalformedSnapshot("invalid artist pubkey".into())),
    };
    Ok(Artist {
        artist_id,
        name,
        pubkey,
    })
}

fn decode_album(value: &Value) -> Result<Album, CoreError> {
    let map = as_map(value, "album")?;
    let artist_id = ArtistId::parse(&get_text(map, keys::album::ARTIST_ID, "album artist id")?)
        .map_err(|e| CoreError::MalformedSnapshot(e.to_string()))?;
    let artist_album_id = AlbumId::parse(&get_text(map, keys::album::ID, "album id")?)
        .map_err(|e| CoreError::MalformedSnapshot(e.to_string()))?;
    let title = get_text(map, keys::album::TITLE, "album title")?;

    let mut tracks = Vec::new();
    for item in get_array(map, keys::album::TRACKS, "album tracks")? {
        let text = match item {
            Value::Text(s) => s,
            _ => return Err(CoreError::MalformedSnapshot("invalid album track id".into())),
        };
        tracks.push(
            TrackId::parse(text).map_err(|e| CoreError::MalformedSnapshot(e.to_string()))?,
        );
    }

    Ok(Album {
        artist_id,
        artist_album_id,
        title,
        tracks,
    })
}

fn decode_track(value: &Value) -> Result<Track, CoreError> {
    let map = as_map(value, "track")?;
    let artist_id = ArtistId::parse(&get_text(map, keys::track::ARTIST_ID, "track artist id")?)
        .map_err(|e| CoreError::MalformedSnapshot(e.to_string()))?;
    let artist_album_id = match get(map, keys::track::ALBUM_ID) {
        Some(Value::Text(s)) => {
            Some(AlbumId::parse(s).map_err(|e| CoreError::MalformedSnapshot(e.to_string()))?)
        }
        Some(Value::Null) | None => None,
        Some(_) => return Err(CoreError::MalformedSnapshot("invalid track album id".into())),
    };
    let artist_track_id = TrackId::parse(&get_text(map, keys::track::ID, "track id")?)
        .map_err(|e| CoreError::MalformedSnapshot(e.to_string()))?;
    let number = match get(map, keys::track::NUMBER) {
        Some(v) => as_uint(v, "track number")?,
        None => return Err(CoreError::MalformedSnapshot("missing track number".into())),
    };
    let album_track_number = u32::try_from(number)
        .map_err(|_| CoreError::MalformedSnapshot("track number out of range".into()))?;
    let title = get_text(map, keys::track::TITLE, "track title")?;

    Ok(Track {
        artist_id,
        artist_album_id,
        artist_track_id,
        album_track_number,
        title,
    })
}

fn decode_peer(value: &Value) -> Result<Peer, CoreError> {
    let map = as_map(value, "peer")?;
    let pubkey = match get(map, keys::peer::PUBKEY) {
        Some(Value::Bytes(b)) => decode_pubkey(b, "peer pubkey")?,
        _ => return Err(CoreError::MalformedSnapshot("invalid peer pubkey".into())),
    };
    let host = get_text(map, keys::peer::HOST, "peer host")?;
    let port = match get(map, keys::peer::PORT) {
        Some(v) => as_uint(v, "peer port")?,
        None => return Err(CoreError::MalformedSnapshot("missing peer port".into())),
    };
    let port = u16::try_from(port)
        .map_err(|_| CoreError::MalformedSnapshot("peer port out of range".into()))?;

    Ok(Peer {
        pubkey,
        host,
        port,
    })
}

fn decode_pubkey(bytes: &[u8], what: &str) -> Result<PublicKey, CoreError> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CoreError::MalformedSnapshot(format!("{} must be 32 bytes", what)))?;
    Ok(PublicKey::from_bytes(arr))
}

fn as_map<'a>(value: &'a Value, what: &str) -> Result<&'a [(Value, Value)], CoreError> {
    match value {
        Value::Map(m) => Ok(m),
        _ => Err(CoreError::MalformedSnapshot(format!("{} is not a map", what))),
    }
}

fn get<'a>(map: &'a [(Value, Value)], key: u64) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == i128::from(key)))
        .map(|(_, v)| v)
}

fn get_text(map: &[(Value, Value)], key: u64, what: &str) -> Result<String, CoreError> {
    match get(map, key) {
        Some(Value::Text(s)) => Ok(s.clone()),
        _ => Err(CoreError::MalformedSnapshot(format!("missing {}", what))),
    }
}

fn get_array<'a>(
    map: &'a [(Value, Value)],
    key: u64,
    what: &str,
) -> Result<&'a [Value], CoreError> {
    match get(map, key) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(CoreError::MalformedSnapshot(format!("missing {}", what))),
    }
}

fn as_uint(value: &Value, what: &str) -> Result<u64, CoreError> {
    match value {
        Value::Integer(i) => u64::try_from(i128::from(*i))
            .map_err(|_| CoreError::MalformedSnapshot(format!("{} out of range", what))),
        _ => Err(CoreError::MalformedSnapshot(format!("{} is not an integer", what))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn sample_snapshot() -> CatalogSnapshot {
        let artist_id = ArtistId::parse("aliceinchains").unwrap();
        let album_id = AlbumId::parse("dirt").unwrap();
        let track_id = TrackId::parse("dirt/would").unwrap();
        let pubkey = Keypair::from_seed(&[0x42; 32]).public_key();

        CatalogSnapshot::new(
            vec![Artist {
                artist_id: artist_id.clone(),
                name: "Alice In Chains".into(),
                pubkey: Some(pubkey),
            }],
            vec![Album {
                artist_id: artist_id.clone(),
                artist_album_id: album_id.clone(),
                title: "Dirt".into(),
                tracks: vec![track_id.clone()],
            }],
            vec![Track {
                artist_id,
                artist_album_id: Some(album_id),
                artist_track_id: track_id,
                album_track_number: 5,
                title: "Would?".into(),
            }],
            vec![Peer {
                pubkey,
                host: "example.onion".into(),
                port: 53545,
            }],
        )
    }

    #[test]
    fn test_encoding_deterministic() {
        let snapshot = sample_snapshot();
        assert_eq!(snapshot_bytes(&snapshot), snapshot_bytes(&snapshot));
    }

    #[test]
    fn test_encoding_independent_of_input_order() {
        let sorted = sample_snapshot();
        let mut shuffled = sorted.clone();
        shuffled.artists.push(Artist {
            artist_id: ArtistId::parse("aaa").unwrap(),
            name: "Aaa".into(),
            pubkey: None,
        });
        shuffled.artists.rotate_right(1);

        let mut with_extra = sorted.clone();
        with_extra.artists.insert(
            0,
            Artist {
                artist_id: ArtistId::parse("aaa").unwrap(),
                name: "Aaa".into(),
                pubkey: None,
            },
        );

        assert_eq!(snapshot_bytes(&shuffled), snapshot_bytes(&with_extra));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let snapshot = sample_snapshot();
        let bytes = snapshot_bytes(&snapshot);
        let decoded = decode_snapshot(&bytes).unwrap();
        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn test_empty_snapshot_roundtrip() {
        let snapshot = CatalogSnapshot::default();
        let decoded = decode_snapshot(&snapshot_bytes(&snapshot)).unwrap();
        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut buf = Vec::new();
        encode_map_header(&mut buf, 1);
        encode_uint(&mut buf, 0, keys::VERSION);
        encode_uint(&mut buf, 0, 99);
        match decode_snapshot(&buf) {
            Err(CoreError::UnsupportedVersion(99)) => {}
            other => panic!("expected unsupported version, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_snapshot(b"not cbor at all").is_err());
        assert!(decode_snapshot(&[]).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_slug() {
        // Hand-encode an artist with an uppercase id.
        let mut buf = Vec::new();
        encode_map_header(&mut buf, 2);
        encode_uint(&mut buf, 0, keys::VERSION);
        encode_uint(&mut buf, 0, SNAPSHOT_VERSION);
        encode_uint(&mut buf, 0, keys::ARTISTS);
        encode_array_header(&mut buf, 1);
        encode_map_header(&mut buf, 3);
        encode_uint(&mut buf, 0, keys::artist::ID);
        encode_text(&mut buf, "NotASlug");
        encode_uint(&mut buf, 0, keys::artist::NAME);
        encode_text(&mut buf, "Not A Slug");
        encode_uint(&mut buf, 0, keys::artist::PUBKEY);
        buf.push(0xf6);
        assert!(matches!(
            decode_snapshot(&buf),
            Err(CoreError::MalformedSnapshot(_))
        ));
    }

    #[test]
    fn test_smallest_uint_encoding() {
        let mut buf = Vec::new();
        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 65536);
        assert_eq!(buf, vec![0x1a, 0x00, 0x01, 0x00, 0x00]);
    }
}
