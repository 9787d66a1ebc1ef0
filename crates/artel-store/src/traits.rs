//! The CatalogStore trait: the abstract interface for catalog persistence.
//!
//! The store exclusively owns durable state. Everything above it (snapshot
//! building, publication, sync) reads and writes through this trait, which
//! lets SQLite, in-memory, or any other backend slot in unchanged.

use async_trait::async_trait;
use artel_core::{
    Album, AlbumId, Artist, ArtistId, Peer, Publication, PublicationId, Track, TrackId,
};

use crate::error::Result;

/// Result of storing a publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The publication was new and has been appended.
    Inserted,
    /// The exact same publication was already stored (idempotent).
    AlreadyExists,
}

/// Async interface for catalog persistence.
///
/// # Design Notes
///
/// - **Tagged absence**: lookups return `Ok(None)` for missing entities; an
///   `Err` always means the backend itself failed.
/// - **Idempotent upserts**: storing an entity equal to the stored value is a
///   no-op and must not bump its modification time, so that repeated merges
///   of an unchanged snapshot leave the store byte-identical.
/// - **Atomic per key**: an upsert is all-or-nothing for its natural key; no
///   partial record is ever observable.
/// - **Modification times** are store-local bookkeeping for incremental
///   (`since`) snapshot requests. They are never serialized into snapshots.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Artists
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up an artist by id.
    async fn get_artist(&self, artist_id: &ArtistId) -> Result<Option<Artist>>;

    /// Upsert an artist keyed by `artist_id`.
    async fn store_artist(&self, artist: &Artist) -> Result<()>;

    /// All artists, optionally restricted to those modified at or after
    /// `since` (Unix ms), ordered by `artist_id`.
    async fn list_artists(&self, since: Option<i64>) -> Result<Vec<Artist>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Albums
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up an album by `(artist_id, artist_album_id)`.
    async fn get_album(&self, artist_id: &ArtistId, album_id: &AlbumId)
        -> Result<Option<Album>>;

    /// Upsert an album keyed by `(artist_id, artist_album_id)`.
    async fn store_album(&self, album: &Album) -> Result<()>;

    /// All albums, optionally restricted by modification time, ordered by
    /// `(artist_id, artist_album_id)`.
    async fn list_albums(&self, since: Option<i64>) -> Result<Vec<Album>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Tracks
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up a track by `(artist_id, artist_track_id)`.
    async fn get_track(&self, artist_id: &ArtistId, track_id: &TrackId)
        -> Result<Option<Track>>;

    /// Upsert a track keyed by `(artist_id, artist_track_id)`.
    async fn store_track(&self, track: &Track) -> Result<()>;

    /// All tracks, optionally restricted by modification time, ordered by
    /// `(artist_id, artist_track_id)`.
    async fn list_tracks(&self, since: Option<i64>) -> Result<Vec<Track>>;

    /// Store the binary payload for a track.
    async fn store_track_payload(
        &self,
        artist_id: &ArtistId,
        track_id: &TrackId,
        payload: &[u8],
    ) -> Result<()>;

    /// Fetch the binary payload for a track.
    async fn get_track_payload(
        &self,
        artist_id: &ArtistId,
        track_id: &TrackId,
    ) -> Result<Option<Vec<u8>>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Peers
    // ─────────────────────────────────────────────────────────────────────────

    /// All known peers, ordered by pubkey.
    async fn get_peers(&self) -> Result<Vec<Peer>>;

    /// Upsert a peer keyed by its pubkey.
    async fn store_peer(&self, peer: &Peer) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Publications
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a publication. Publications are append-only history; storing
    /// the same one twice reports `AlreadyExists`.
    async fn store_publication(&self, publication: &Publication) -> Result<InsertOutcome>;

    /// The most recently stored publication for an artist, if any.
    async fn latest_publication(&self, artist_id: &ArtistId) -> Result<Option<Publication>>;

    /// Look up a publication by its content address.
    async fn get_publication(&self, id: &PublicationId) -> Result<Option<Publication>>;
}
