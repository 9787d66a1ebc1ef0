//! The Node: unified API for an Artel instance.
//!
//! A node hosts one local artist's catalog, publishes it as signed
//! snapshots, serves it to peers, and pulls peers' catalogs into its own
//! store. All state lives in the store and the signing oracle; the node is
//! an explicit context object with no globals.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use artel_core::{
    Album, AlbumId, Artist, ArtistId, CatalogFilter, Peer, Publication, PublicKey, Track, TrackId,
};
use artel_store::CatalogStore;
use artel_sync::{
    build_snapshot, sign_snapshot, tcp::TcpChannel, Signer, SyncClient, SyncError, SyncReport,
    SyncService,
};

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};

/// An Artel node.
///
/// Generic over the storage backend and the signing oracle so tests can run
/// entirely in memory.
pub struct Node<S, O> {
    config: NodeConfig,
    store: Arc<S>,
    signer: Arc<O>,
    artist_id: ArtistId,
    service: Arc<SyncService<S, O>>,
}

impl<S, O> Node<S, O>
where
    S: CatalogStore + 'static,
    O: Signer + 'static,
{
    /// Create a node hosting the artist named in `config`.
    pub fn new(config: NodeConfig, store: S, signer: O) -> Result<Self> {
        let artist_id = ArtistId::from_name(&config.artist_name)?;
        let store = Arc::new(store);
        let signer = Arc::new(signer);
        let service = Arc::new(SyncService::new(
            Arc::clone(&store),
            Arc::clone(&signer),
            artist_id.clone(),
        ));
        Ok(Self {
            config,
            store,
            signer,
            artist_id,
            service,
        })
    }

    /// The id of the locally hosted artist.
    pub fn artist_id(&self) -> &ArtistId {
        &self.artist_id
    }

    /// The identity this node signs as.
    pub fn identity(&self) -> PublicKey {
        self.signer.identity()
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local catalog mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Register the local artist, binding the oracle's identity to it.
    ///
    /// Create-if-absent; the pubkey is bound exactly once. Fails if the
    /// configured pubkey or a previously stored binding disagrees with the
    /// oracle.
    pub async fn register_artist(&self) -> Result<Artist> {
        let identity = self.signer.identity();

        if let Some(configured) = &self.config.artist_pubkey {
            let configured = PublicKey::from_hex(configured)?;
            if configured != identity {
                return Err(NodeError::IdentityMismatch(format!(
                    "configured pubkey {} but oracle signs as {}",
                    configured.to_hex(),
                    identity.to_hex()
                )));
            }
        }

        let mut artist = match self.store.get_artist(&self.artist_id).await? {
            Some(artist) => artist,
            None => Artist {
                artist_id: self.artist_id.clone(),
                name: self.config.artist_name.clone(),
                pubkey: None,
            },
        };

        match artist.pubkey {
            None => artist.pubkey = Some(identity),
            Some(bound) if bound != identity => {
                return Err(NodeError::IdentityMismatch(format!(
                    "artist {} already bound to {}",
                    self.artist_id,
                    bound.to_hex()
                )))
            }
            Some(_) => {}
        }

        self.store.store_artist(&artist).await?;
        tracing::info!(artist = %self.artist_id, "registered local artist");
        Ok(artist)
    }

    /// Add a track to the local catalog and republish.
    ///
    /// Slugs are derived from the titles. With an album title the track is
    /// filed under `"<album-slug>/<track-slug>"` and the album's track list
    /// is rebuilt in track-number order.
    pub async fn add_track(
        &self,
        album_title: Option<&str>,
        album_track_number: u32,
        track_title: &str,
        payload: &[u8],
    ) -> Result<Track> {
        self.register_artist().await?;

        let album_id = album_title.map(AlbumId::from_title).transpose()?;
        let track_id = match &album_id {
            Some(album_id) => TrackId::in_album(album_id, track_title)?,
            None => TrackId::from_title(track_title)?,
        };

        let track = Track {
            artist_id: self.artist_id.clone(),
            artist_album_id: album_id.clone(),
            artist_track_id: track_id.clone(),
            album_track_number,
            title: track_title.to_string(),
        };
        self.store.store_track(&track).await?;
        self.store
            .store_track_payload(&self.artist_id, &track_id, payload)
            .await?;

        if let (Some(album_id), Some(album_title)) = (album_id, album_title) {
            self.upsert_album(album_id, album_title).await?;
        }

        self.publish().await?;
        Ok(track)
    }

    /// Rebuild an album's track list from the store, in track-number order.
    async fn upsert_album(&self, album_id: AlbumId, album_title: &str) -> Result<()> {
        let mut album_tracks: Vec<Track> = self
            .store
            .list_tracks(None)
            .await?
            .into_iter()
            .filter(|t| {
                t.artist_id == self.artist_id && t.artist_album_id.as_ref() == Some(&album_id)
            })
            .collect();
        album_tracks.sort_by_key(|t| t.album_track_number);

        let album = Album {
            artist_id: self.artist_id.clone(),
            artist_album_id: album_id,
            title: album_title.to_string(),
            tracks: album_tracks
                .into_iter()
                .map(|t| t.artist_track_id)
                .collect(),
        };
        self.store.store_album(&album).await?;
        Ok(())
    }

    /// Build, sign, and persist a publication of the full local catalog.
    pub async fn publish(&self) -> Result<Publication> {
        let artist = self
            .store
            .get_artist(&self.artist_id)
            .await?
            .ok_or(NodeError::NotRegistered)?;

        let snapshot = build_snapshot(&*self.store, &CatalogFilter::all()).await?;
        let publication = sign_snapshot(&*self.signer, &artist, &snapshot)
            .await
            .map_err(SyncError::from)?;

        self.store.store_publication(&publication).await?;
        tracing::info!(
            artist = %self.artist_id,
            publication = %publication.compute_id().to_hex(),
            "published catalog"
        );
        Ok(publication)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Peers
    // ─────────────────────────────────────────────────────────────────────────

    /// Parse and store a peer address of the form `pubkey@host:port`.
    pub async fn add_peer(&self, address: &str) -> Result<Peer> {
        let peer: Peer = address.parse()?;
        self.store.store_peer(&peer).await?;
        Ok(peer)
    }

    /// Sync with every stored peer, bounded-concurrently.
    ///
    /// One task per peer, at most `max_concurrent_syncs` in flight. A peer
    /// whose own identity matches this node is skipped. One peer's failure
    /// never cancels the others; each outcome is reported alongside its
    /// peer.
    pub async fn sync_peers(&self) -> Result<Vec<(Peer, std::result::Result<SyncReport, SyncError>)>>
    where
        S: Send + Sync,
        O: Send + Sync,
    {
        let identity = self.signer.identity();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_syncs.max(1)));
        let mut tasks = JoinSet::new();

        for peer in self.store.get_peers().await? {
            if peer.pubkey == identity {
                tracing::debug!(peer = %peer, "skipping self-sync");
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let store = Arc::clone(&self.store);
            let signer = Arc::clone(&self.signer);
            let sync_config = self.config.sync_config();

            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => sync_one(&peer, &*store, &*signer, sync_config).await,
                    // The semaphore is never closed while tasks run.
                    Err(_) => Err(SyncError::Transport("sync limiter closed".into())),
                };
                (peer, outcome)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((peer, outcome)) => {
                    match &outcome {
                        Ok(report) => tracing::info!(
                            peer = %peer,
                            artists = report.artists,
                            tracks = report.tracks,
                            "peer sync complete"
                        ),
                        Err(e) => tracing::warn!(peer = %peer, "peer sync failed: {}", e),
                    }
                    results.push((peer, outcome));
                }
                Err(e) => tracing::warn!("sync task panicked: {}", e),
            }
        }
        Ok(results)
    }

    /// Fetch one track's payload from a peer and store it locally.
    pub async fn download_track(
        &self,
        peer: &Peer,
        artist_id: &ArtistId,
        artist_track_id: &TrackId,
    ) -> Result<Vec<u8>> {
        let sync_config = self.config.sync_config();
        let channel = TcpChannel::connect(&peer.endpoint(), sync_config.connect_timeout).await?;
        let mut client = SyncClient::with_config(channel, sync_config);
        let payload = client
            .download_track(&*self.store, artist_id, artist_track_id)
            .await?;
        Ok(payload)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Serving
    // ─────────────────────────────────────────────────────────────────────────

    /// Serve the catalog on `listener` until `shutdown` flips to true.
    pub async fn serve(&self, listener: TcpListener, shutdown: watch::Receiver<bool>) -> Result<()>
    where
        S: Send + Sync,
        O: Send + Sync,
    {
        Arc::clone(&self.service).serve(listener, shutdown).await?;
        Ok(())
    }
}

/// One complete sync against one peer.
async fn sync_one<S, O>(
    peer: &Peer,
    store: &S,
    signer: &O,
    config: artel_sync::SyncConfig,
) -> std::result::Result<SyncReport, SyncError>
where
    S: CatalogStore + ?Sized,
    O: Signer + ?Sized,
{
    let channel = TcpChannel::connect(&peer.endpoint(), config.connect_timeout).await?;
    let mut client = SyncClient::with_config(channel, config);
    client.sync(signer, store, CatalogFilter::all()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use artel_core::Keypair;
    use artel_store::MemoryStore;
    use artel_sync::LocalSigner;

    fn test_node(seed: u8, name: &str) -> Node<MemoryStore, LocalSigner> {
        Node::new(
            NodeConfig::for_artist(name),
            MemoryStore::new(),
            LocalSigner::new(Keypair::from_seed(&[seed; 32])),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_binds_identity_once() {
        let node = test_node(1, "Alice In Chains");

        let artist = node.register_artist().await.unwrap();
        assert_eq!(artist.artist_id.as_str(), "aliceinchains");
        assert_eq!(artist.pubkey, Some(node.identity()));

        // Re-registration is a no-op, not a rebind.
        let again = node.register_artist().await.unwrap();
        assert_eq!(again, artist);
    }

    #[tokio::test]
    async fn test_register_rejects_configured_pubkey_mismatch() {
        let other_key = Keypair::from_seed(&[7; 32]).public_key();
        let mut config = NodeConfig::for_artist("Alice In Chains");
        config.artist_pubkey = Some(other_key.to_hex());

        let node = Node::new(
            config,
            MemoryStore::new(),
            LocalSigner::new(Keypair::from_seed(&[1; 32])),
        )
        .unwrap();

        let err = node.register_artist().await.unwrap_err();
        assert!(matches!(err, NodeError::IdentityMismatch(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_foreign_binding() {
        let node = test_node(1, "Alice In Chains");
        let foreign = Keypair::from_seed(&[9; 32]).public_key();

        node.store
            .store_artist(&Artist {
                artist_id: node.artist_id.clone(),
                name: "Alice In Chains".into(),
                pubkey: Some(foreign),
            })
            .await
            .unwrap();

        let err = node.register_artist().await.unwrap_err();
        assert!(matches!(err, NodeError::IdentityMismatch(_)));
    }

    #[tokio::test]
    async fn test_add_track_derives_slugs_and_publishes() {
        let node = test_node(1, "Alice In Chains");

        let track = node
            .add_track(Some("Dirt"), 12, "Would?", b"audio bytes")
            .await
            .unwrap();
        assert_eq!(track.artist_track_id.as_str(), "dirt/would");

        let album = node
            .store
            .get_album(&node.artist_id, &AlbumId::parse("dirt").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(album.title, "Dirt");
        assert_eq!(album.tracks, vec![TrackId::parse("dirt/would").unwrap()]);

        let payload = node
            .store
            .get_track_payload(&node.artist_id, &track.artist_track_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload, b"audio bytes");

        // A publication was persisted as part of the mutation.
        let publication = node
            .store
            .latest_publication(&node.artist_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(publication.artist.artist_id, node.artist_id);
    }

    #[tokio::test]
    async fn test_album_track_list_follows_track_numbers() {
        let node = test_node(1, "Alice In Chains");

        node.add_track(Some("Dirt"), 12, "Would?", b"w").await.unwrap();
        node.add_track(Some("Dirt"), 1, "Them Bones", b"tb").await.unwrap();

        let album = node
            .store
            .get_album(&node.artist_id, &AlbumId::parse("dirt").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            album.tracks,
            vec![
                TrackId::parse("dirt/thembones").unwrap(),
                TrackId::parse("dirt/would").unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn test_publish_requires_registration() {
        let node = test_node(1, "Alice In Chains");
        let err = node.publish().await.unwrap_err();
        assert!(matches!(err, NodeError::NotRegistered));
    }

    #[tokio::test]
    async fn test_add_peer_parses_and_stores() {
        let node = test_node(1, "Alice In Chains");
        let pubkey = Keypair::from_seed(&[5; 32]).public_key();
        let address = format!("{}@peer.example.onion:53545", pubkey.to_hex());

        let peer = node.add_peer(&address).await.unwrap();
        assert_eq!(peer.pubkey, pubkey);
        assert_eq!(peer.host, "peer.example.onion");
        assert_eq!(peer.port, 53545);

        assert!(node.add_peer("not-an-address").await.is_err());
        assert_eq!(node.store.get_peers().await.unwrap(), vec![peer]);
    }

    #[tokio::test]
    async fn test_sync_peers_skips_self() {
        let node = test_node(1, "Alice In Chains");
        let address = format!("{}@127.0.0.1:1", node.identity().to_hex());
        node.add_peer(&address).await.unwrap();

        // The only stored peer is ourselves, so nothing is dialed.
        let results = node.sync_peers().await.unwrap();
        assert!(results.is_empty());
    }
}
