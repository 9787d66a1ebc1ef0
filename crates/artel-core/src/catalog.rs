//! Catalog entities and the snapshot aggregate.
//!
//! Entities are immutable value records; mutation is replace-by-key. The
//! natural keys are slugs (see [`crate::slug`]) except for peers, which are
//! keyed by their public key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::PublicKey;
use crate::error::CoreError;
use crate::slug::{AlbumId, ArtistId, TrackId};

/// A publishing identity and its catalog namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    /// Stable lowercase slug, unique across the network. Primary key.
    pub artist_id: ArtistId,
    /// Human-readable display name.
    pub name: String,
    /// Identity used to verify this artist's publications. `None` until the
    /// artist is first bound to a signing identity; set exactly once.
    pub pubkey: Option<PublicKey>,
}

/// A grouping of tracks. Carries no payload of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub artist_id: ArtistId,
    /// Slug unique within `artist_id`.
    pub artist_album_id: AlbumId,
    pub title: String,
    /// Track ids in album order.
    pub tracks: Vec<TrackId>,
}

/// A single work. The binary payload is stored out of band, addressed by
/// `(artist_id, artist_track_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub artist_id: ArtistId,
    /// `None` for a singleton track.
    pub artist_album_id: Option<AlbumId>,
    /// Slug unique within the artist, `"album/track"` when in an album.
    pub artist_track_id: TrackId,
    /// 1-based position within the album, 0 for singletons.
    pub album_track_number: u32,
    pub title: String,
}

/// A remote node's network address and claimed identity. Keyed by pubkey.
///
/// Textual form is `pubkey@host:port` with a hex pubkey and decimal port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub pubkey: PublicKey,
    pub host: String,
    pub port: u16,
}

impl Peer {
    /// The `host:port` dial string.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.pubkey.to_hex(), self.host, self.port)
    }
}

impl FromStr for Peer {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || CoreError::InvalidPeerAddress(s.to_string());

        let (pubkey_hex, rest) = s.split_once('@').ok_or_else(bad)?;
        let (host, port_str) = rest.rsplit_once(':').ok_or_else(bad)?;
        if host.is_empty() {
            return Err(bad());
        }
        let pubkey = PublicKey::from_hex(pubkey_hex).map_err(|_| bad())?;
        let port: u16 = port_str.parse().map_err(|_| bad())?;

        Ok(Peer {
            pubkey,
            host: host.to_string(),
            port,
        })
    }
}

/// Filter selecting which part of a catalog a snapshot should cover.
///
/// All fields optional; an empty filter selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilter {
    /// Restrict to one artist's namespace.
    pub artist_id: Option<ArtistId>,
    /// Restrict to a single track.
    pub artist_track_id: Option<TrackId>,
    /// Only entities modified at or after this instant (Unix ms).
    pub since: Option<i64>,
}

impl CatalogFilter {
    /// The unfiltered catalog.
    pub fn all() -> Self {
        Self::default()
    }

    /// Everything in one artist's namespace.
    pub fn for_artist(artist_id: ArtistId) -> Self {
        Self {
            artist_id: Some(artist_id),
            ..Self::default()
        }
    }

    /// A single track.
    pub fn for_track(artist_id: ArtistId, artist_track_id: TrackId) -> Self {
        Self {
            artist_id: Some(artist_id),
            artist_track_id: Some(artist_track_id),
            since: None,
        }
    }

    /// Entities modified at or after `since` (Unix ms).
    pub fn modified_since(since: i64) -> Self {
        Self {
            since: Some(since),
            ..Self::default()
        }
    }

    pub fn is_all(&self) -> bool {
        self.artist_id.is_none() && self.artist_track_id.is_none() && self.since.is_none()
    }
}

/// The aggregate of all catalog entities known locally, or a filtered subset.
///
/// Collections are kept sorted by natural key so that serialization is
/// deterministic regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub artists: Vec<Artist>,
    pub albums: Vec<Album>,
    pub tracks: Vec<Track>,
    pub peers: Vec<Peer>,
}

impl CatalogSnapshot {
    /// Assemble a snapshot, sorting every collection by its natural key.
    pub fn new(
        mut artists: Vec<Artist>,
        mut albums: Vec<Album>,
        mut tracks: Vec<Track>,
        mut peers: Vec<Peer>,
    ) -> Self {
        artists.sort_by(|a, b| a.artist_id.cmp(&b.artist_id));
        albums.sort_by(|a, b| {
            (&a.artist_id, &a.artist_album_id).cmp(&(&b.artist_id, &b.artist_album_id))
        });
        tracks.sort_by(|a, b| {
            (&a.artist_id, &a.artist_track_id).cmp(&(&b.artist_id, &b.artist_track_id))
        });
        peers.sort_by(|a, b| a.pubkey.cmp(&b.pubkey));
        Self {
            artists,
            albums,
            tracks,
            peers,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
            && self.albums.is_empty()
            && self.tracks.is_empty()
            && self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_peer_address_roundtrip() {
        let pubkey = Keypair::from_seed(&[0x11; 32]).public_key();
        let addr = format!("{}@music.example.onion:53545", pubkey.to_hex());
        let peer: Peer = addr.parse().unwrap();
        assert_eq!(peer.pubkey, pubkey);
        assert_eq!(peer.host, "music.example.onion");
        assert_eq!(peer.port, 53545);
        assert_eq!(peer.to_string(), addr);
    }

    #[test]
    fn test_peer_address_rejects_malformed() {
        assert!("deadbeef@host".parse::<Peer>().is_err());
        assert!("nothex@host:1234".parse::<Peer>().is_err());
        assert!("@host:1234".parse::<Peer>().is_err());
        let pubkey = Keypair::from_seed(&[0x22; 32]).public_key().to_hex();
        assert!(format!("{}@:1234", pubkey).parse::<Peer>().is_err());
        assert!(format!("{}@host:notaport", pubkey).parse::<Peer>().is_err());
    }

    #[test]
    fn test_snapshot_sorts_by_natural_key() {
        let a = Artist {
            artist_id: ArtistId::parse("aaa").unwrap(),
            name: "Aaa".into(),
            pubkey: None,
        };
        let z = Artist {
            artist_id: ArtistId::parse("zzz").unwrap(),
            name: "Zzz".into(),
            pubkey: None,
        };
        let snapshot = CatalogSnapshot::new(vec![z.clone(), a.clone()], vec![], vec![], vec![]);
        assert_eq!(snapshot.artists, vec![a, z]);
    }

    #[test]
    fn test_filter_selectors() {
        assert!(CatalogFilter::all().is_all());
        let artist = ArtistId::parse("aliceinchains").unwrap();
        let filter = CatalogFilter::for_artist(artist.clone());
        assert_eq!(filter.artist_id, Some(artist));
        assert!(!filter.is_all());
    }
}
