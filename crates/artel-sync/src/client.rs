//! Sync client: fetch a peer's catalog, verify it, and merge it locally.

use std::collections::BTreeSet;
use std::time::Duration;

use artel_core::{ArtistId, CatalogFilter, CatalogSnapshot, PublicKey, TrackId};
use artel_store::CatalogStore;

use crate::error::{Result, SyncError};
use crate::messages::{WireMessage, PROTOCOL_VERSION};
use crate::publish::verify_publication;
use crate::signer::Signer;
use crate::transport::Channel;

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Timeout for each request/response round trip.
    pub request_timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// A rejected claim of ownership over a known artist id.
///
/// Recorded in the report rather than aborting the sync; the rest of the
/// snapshot still merges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConflict {
    pub artist_id: ArtistId,
    /// The identity we already trust for this artist.
    pub stored: PublicKey,
    /// The identity the snapshot claimed.
    pub claimed: PublicKey,
}

/// Result of one sync session.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Artists merged into the local store.
    pub artists: usize,
    /// Albums merged.
    pub albums: usize,
    /// Tracks merged.
    pub tracks: usize,
    /// Peers merged.
    pub peers: usize,
    /// Identity claims that were rejected.
    pub conflicts: Vec<IdentityConflict>,
}

/// Client side of the sync protocol, bound to one channel.
pub struct SyncClient<C: Channel> {
    channel: C,
    config: SyncConfig,
}

impl<C: Channel> SyncClient<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            config: SyncConfig::default(),
        }
    }

    pub fn with_config(channel: C, config: SyncConfig) -> Self {
        Self { channel, config }
    }

    /// Fetch the peer's catalog for `filter`, verify the publication, and
    /// merge the recovered snapshot into `store`.
    pub async fn sync<S, O>(
        &mut self,
        oracle: &O,
        store: &S,
        filter: CatalogFilter,
    ) -> Result<SyncReport>
    where
        S: CatalogStore + ?Sized,
        O: Signer + ?Sized,
    {
        self.channel
            .send(WireMessage::GetCatalog {
                protocol_version: PROTOCOL_VERSION,
                filter,
            })
            .await?;

        let publication = match self.channel.recv(self.config.request_timeout).await? {
            WireMessage::Catalog { publication } => publication,
            WireMessage::Error { code, message } => {
                return Err(SyncError::Peer { code, message })
            }
            other => {
                return Err(SyncError::InvalidMessage(format!(
                    "expected Catalog, got {:?}",
                    std::mem::discriminant(&other)
                )))
            }
        };

        let snapshot = verify_publication(oracle, &publication).await?;
        let report = merge_snapshot(store, &snapshot).await?;

        tracing::info!(
            artists = report.artists,
            albums = report.albums,
            tracks = report.tracks,
            conflicts = report.conflicts.len(),
            "catalog merged"
        );
        Ok(report)
    }

    /// Fetch one track's binary payload and store it locally.
    pub async fn download_track<S>(
        &mut self,
        store: &S,
        artist_id: &ArtistId,
        artist_track_id: &TrackId,
    ) -> Result<Vec<u8>>
    where
        S: CatalogStore + ?Sized,
    {
        self.channel
            .send(WireMessage::GetTrackPayload {
                protocol_version: PROTOCOL_VERSION,
                artist_id: artist_id.clone(),
                artist_track_id: artist_track_id.clone(),
            })
            .await?;

        let payload = match self.channel.recv(self.config.request_timeout).await? {
            WireMessage::TrackPayload { payload } => payload,
            WireMessage::Error { code, message } => {
                return Err(SyncError::Peer { code, message })
            }
            other => {
                return Err(SyncError::InvalidMessage(format!(
                    "expected TrackPayload, got {:?}",
                    std::mem::discriminant(&other)
                )))
            }
        };

        store
            .store_track_payload(artist_id, artist_track_id, &payload)
            .await?;
        Ok(payload)
    }
}

/// Merge a verified snapshot into the store.
///
/// Upsert by natural key, except artist identity: the first pubkey bound to
/// an artist id wins. A snapshot claiming a different pubkey for a known
/// artist gets an [`IdentityConflict`] entry and that artist's subtree is
/// skipped. An incoming artist without a pubkey never erases a stored one.
pub async fn merge_snapshot<S>(store: &S, snapshot: &CatalogSnapshot) -> Result<SyncReport>
where
    S: CatalogStore + ?Sized,
{
    let mut report = SyncReport::default();
    let mut skipped: BTreeSet<ArtistId> = BTreeSet::new();

    for artist in &snapshot.artists {
        let mut merged = artist.clone();

        if let Some(existing) = store.get_artist(&artist.artist_id).await? {
            match (existing.pubkey, artist.pubkey) {
                (Some(stored), Some(claimed)) if stored != claimed => {
                    tracing::warn!(
                        artist = %artist.artist_id,
                        stored = %stored.to_hex(),
                        claimed = %claimed.to_hex(),
                        "rejecting conflicting identity claim"
                    );
                    report.conflicts.push(IdentityConflict {
                        artist_id: artist.artist_id.clone(),
                        stored,
                        claimed,
                    });
                    skipped.insert(artist.artist_id.clone());
                    continue;
                }
                (Some(stored), None) => {
                    merged.pubkey = Some(stored);
                }
                _ => {}
            }
        }

        store.store_artist(&merged).await?;
        report.artists += 1;
    }

    for album in &snapshot.albums {
        if skipped.contains(&album.artist_id) {
            continue;
        }
        store.store_album(album).await?;
        report.albums += 1;
    }

    for track in &snapshot.tracks {
        if skipped.contains(&track.artist_id) {
            continue;
        }
        store.store_track(track).await?;
        report.tracks += 1;
    }

    for peer in &snapshot.peers {
        store.store_peer(peer).await?;
        report.peers += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::WireErrorCode;
    use crate::signer::LocalSigner;
    use crate::transport::memory;
    use artel_core::{Artist, Keypair, Track};
    use artel_store::MemoryStore;

    fn artist(id: &str, pubkey: Option<PublicKey>) -> Artist {
        Artist {
            artist_id: ArtistId::parse(id).unwrap(),
            name: id.to_string(),
            pubkey,
        }
    }

    fn track(artist_id: &str, track_id: &str) -> Track {
        Track {
            artist_id: ArtistId::parse(artist_id).unwrap(),
            artist_album_id: None,
            artist_track_id: TrackId::parse(track_id).unwrap(),
            album_track_number: 0,
            title: track_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let store = MemoryStore::new();
        let key = Keypair::from_seed(&[1; 32]).public_key();
        let snapshot = CatalogSnapshot::new(
            vec![artist("aliceinchains", Some(key))],
            vec![],
            vec![track("aliceinchains", "would")],
            vec![],
        );

        merge_snapshot(&store, &snapshot).await.unwrap();
        merge_snapshot(&store, &snapshot).await.unwrap();

        assert_eq!(store.list_artists(None).await.unwrap().len(), 1);
        assert_eq!(store.list_tracks(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_identity_conflict_skips_subtree() {
        let store = MemoryStore::new();
        let stored_key = Keypair::from_seed(&[1; 32]).public_key();
        let claimed_key = Keypair::from_seed(&[2; 32]).public_key();

        store
            .store_artist(&artist("aliceinchains", Some(stored_key)))
            .await
            .unwrap();

        let snapshot = CatalogSnapshot::new(
            vec![
                artist("aliceinchains", Some(claimed_key)),
                artist("soundgarden", None),
            ],
            vec![],
            vec![
                track("aliceinchains", "impostortrack"),
                track("soundgarden", "spoonman"),
            ],
            vec![],
        );

        let report = merge_snapshot(&store, &snapshot).await.unwrap();

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].stored, stored_key);
        assert_eq!(report.conflicts[0].claimed, claimed_key);

        // The stored identity is untouched and the impostor's track was
        // dropped, but the unrelated artist still merged.
        let alice = store
            .get_artist(&ArtistId::parse("aliceinchains").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.pubkey, Some(stored_key));

        let tracks = store.list_tracks(None).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].artist_track_id.as_str(), "spoonman");
    }

    #[tokio::test]
    async fn test_incoming_none_pubkey_preserves_stored_key() {
        let store = MemoryStore::new();
        let key = Keypair::from_seed(&[1; 32]).public_key();
        store
            .store_artist(&artist("aliceinchains", Some(key)))
            .await
            .unwrap();

        let snapshot = CatalogSnapshot::new(
            vec![artist("aliceinchains", None)],
            vec![],
            vec![],
            vec![],
        );
        let report = merge_snapshot(&store, &snapshot).await.unwrap();
        assert!(report.conflicts.is_empty());

        let alice = store
            .get_artist(&ArtistId::parse("aliceinchains").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.pubkey, Some(key));
    }

    #[tokio::test]
    async fn test_peer_version_rejection_surfaces_as_peer_error() {
        let (client_chan, mut server_chan) = memory::pair();

        tokio::spawn(async move {
            let _ = server_chan.recv(Duration::from_secs(1)).await;
            server_chan
                .send(WireMessage::Error {
                    code: WireErrorCode::VersionMismatch,
                    message: "protocol version 2 not supported, want 1".into(),
                })
                .await
                .unwrap();
        });

        let verifier = LocalSigner::new(Keypair::from_seed(&[1; 32]));
        let store = MemoryStore::new();
        let mut client = SyncClient::new(client_chan);

        let err = client
            .sync(&verifier, &store, CatalogFilter::all())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Peer {
                code: WireErrorCode::VersionMismatch,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_first_writer_binds_identity() {
        let store = MemoryStore::new();
        let key = Keypair::from_seed(&[1; 32]).public_key();

        // Artist known without a key; the first claimed key binds.
        store.store_artist(&artist("aliceinchains", None)).await.unwrap();
        let snapshot = CatalogSnapshot::new(
            vec![artist("aliceinchains", Some(key))],
            vec![],
            vec![],
            vec![],
        );
        merge_snapshot(&store, &snapshot).await.unwrap();

        let alice = store
            .get_artist(&ArtistId::parse("aliceinchains").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.pubkey, Some(key));
    }
}
