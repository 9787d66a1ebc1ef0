//! SQLite implementation of the CatalogStore trait.
//!
//! This is the primary storage backend for a node. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use artel_core::{
    Album, AlbumId, Artist, ArtistId, CatalogSignature, Peer, Publication, PublicationId,
    PublicKey, Track, TrackId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{CatalogStore, InsertOutcome};

/// SQLite-based catalog store.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        tracing::debug!(path = %path.as_ref().display(), "opening catalog database");
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                StoreError::Internal(format!("mutex poisoned: {}", e))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("spawn_blocking failed: {}", e)))?
    }
}

fn parse_artist_id(raw: String) -> Result<ArtistId> {
    ArtistId::parse(&raw).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn parse_album_id(raw: String) -> Result<AlbumId> {
    AlbumId::parse(&raw).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn parse_track_id(raw: String) -> Result<TrackId> {
    TrackId::parse(&raw).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn parse_pubkey(raw: Vec<u8>) -> Result<PublicKey> {
    let bytes: [u8; 32] = raw
        .try_into()
        .map_err(|_| StoreError::InvalidData("pubkey must be 32 bytes".into()))?;
    Ok(PublicKey::from_bytes(bytes))
}

fn encode_track_list(tracks: &[TrackId]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(tracks, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_track_list(raw: &[u8]) -> Result<Vec<TrackId>> {
    ciborium::from_reader(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

// Raw column tuples; converted to domain types outside the rusqlite closures
// so parse failures surface as StoreError rather than rusqlite errors.
type ArtistRow = (String, String, Option<Vec<u8>>);
type AlbumRow = (String, String, String, Vec<u8>);
type TrackRow = (String, String, Option<String>, i64, String);
type PublicationRow = (String, String, Option<Vec<u8>>, Vec<u8>, Vec<u8>);

fn artist_from_row(row: ArtistRow) -> Result<Artist> {
    let (artist_id, name, pubkey) = row;
    Ok(Artist {
        artist_id: parse_artist_id(artist_id)?,
        name,
        pubkey: pubkey.map(parse_pubkey).transpose()?,
    })
}

fn album_from_row(row: AlbumRow) -> Result<Album> {
    let (artist_id, artist_album_id, title, tracks) = row;
    Ok(Album {
        artist_id: parse_artist_id(artist_id)?,
        artist_album_id: parse_album_id(artist_album_id)?,
        title,
        tracks: decode_track_list(&tracks)?,
    })
}

fn track_from_row(row: TrackRow) -> Result<Track> {
    let (artist_id, artist_track_id, artist_album_id, album_track_number, title) = row;
    Ok(Track {
        artist_id: parse_artist_id(artist_id)?,
        artist_album_id: artist_album_id.map(parse_album_id).transpose()?,
        artist_track_id: parse_track_id(artist_track_id)?,
        album_track_number: album_track_number as u32,
        title,
    })
}

fn publication_from_row(row: PublicationRow) -> Result<Publication> {
    let (artist_id, artist_name, artist_pubkey, signature, snapshot) = row;
    Ok(Publication {
        artist: Artist {
            artist_id: parse_artist_id(artist_id)?,
            name: artist_name,
            pubkey: artist_pubkey.map(parse_pubkey).transpose()?,
        },
        signature: CatalogSignature::from_bytes(&signature)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?,
        serialized_snapshot: Bytes::from(snapshot),
    })
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn get_artist(&self, artist_id: &ArtistId) -> Result<Option<Artist>> {
        let artist_id = artist_id.clone();
        self.blocking(move |conn| {
            let row: Option<ArtistRow> = conn
                .query_row(
                    "SELECT artist_id, name, pubkey FROM artists WHERE artist_id = ?1",
                    params![artist_id.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            row.map(artist_from_row).transpose()
        })
        .await
    }

    async fn store_artist(&self, artist: &Artist) -> Result<()> {
        let artist = artist.clone();
        self.blocking(move |conn| {
            let existing: Option<ArtistRow> = conn
                .query_row(
                    "SELECT artist_id, name, pubkey FROM artists WHERE artist_id = ?1",
                    params![artist.artist_id.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            // Unchanged writes keep the existing modification time.
            if let Some(row) = existing {
                if artist_from_row(row)? == artist {
                    return Ok(());
                }
            }

            conn.execute(
                "INSERT INTO artists (artist_id, name, pubkey, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(artist_id) DO UPDATE SET
                    name = excluded.name,
                    pubkey = excluded.pubkey,
                    updated_at = excluded.updated_at",
                params![
                    artist.artist_id.as_str(),
                    &artist.name,
                    artist.pubkey.as_ref().map(|k| k.as_bytes().as_slice()),
                    now_millis(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_artists(&self, since: Option<i64>) -> Result<Vec<Artist>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT artist_id, name, pubkey FROM artists
                 WHERE updated_at >= ?1 ORDER BY artist_id",
            )?;
            let rows = stmt
                .query_map(params![since.unwrap_or(i64::MIN)], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<rusqlite::Result<Vec<ArtistRow>>>()?;
            rows.into_iter().map(artist_from_row).collect()
        })
        .await
    }

    async fn get_album(
        &self,
        artist_id: &ArtistId,
        album_id: &AlbumId,
    ) -> Result<Option<Album>> {
        let artist_id = artist_id.clone();
        let album_id = album_id.clone();
        self.blocking(move |conn| {
            let row: Option<AlbumRow> = conn
                .query_row(
                    "SELECT artist_id, artist_album_id, title, tracks FROM albums
                     WHERE artist_id = ?1 AND artist_album_id = ?2",
                    params![artist_id.as_str(), album_id.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;
            row.map(album_from_row).transpose()
        })
        .await
    }

    async fn store_album(&self, album: &Album) -> Result<()> {
        let album = album.clone();
        self.blocking(move |conn| {
            let existing: Option<AlbumRow> = conn
                .query_row(
                    "SELECT artist_id, artist_album_id, title, tracks FROM albums
                     WHERE artist_id = ?1 AND artist_album_id = ?2",
                    params![album.artist_id.as_str(), album.artist_album_id.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            if let Some(row) = existing {
                if album_from_row(row)? == album {
                    return Ok(());
                }
            }

            conn.execute(
                "INSERT INTO albums (artist_id, artist_album_id, title, tracks, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(artist_id, artist_album_id) DO UPDATE SET
                    title = excluded.title,
                    tracks = excluded.tracks,
                    updated_at = excluded.updated_at",
                params![
                    album.artist_id.as_str(),
                    album.artist_album_id.as_str(),
                    &album.title,
                    encode_track_list(&album.tracks)?,
                    now_millis(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_albums(&self, since: Option<i64>) -> Result<Vec<Album>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT artist_id, artist_album_id, title, tracks FROM albums
                 WHERE updated_at >= ?1 ORDER BY artist_id, artist_album_id",
            )?;
            let rows = stmt
                .query_map(params![since.unwrap_or(i64::MIN)], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?
                .collect::<rusqlite::Result<Vec<AlbumRow>>>()?;
            rows.into_iter().map(album_from_row).collect()
        })
        .await
    }

    async fn get_track(
        &self,
        artist_id: &ArtistId,
        track_id: &TrackId,
    ) -> Result<Option<Track>> {
        let artist_id = artist_id.clone();
        let track_id = track_id.clone();
        self.blocking(move |conn| {
            let row: Option<TrackRow> = conn
                .query_row(
                    "SELECT artist_id, artist_track_id, artist_album_id,
                            album_track_number, title
                     FROM tracks WHERE artist_id = ?1 AND artist_track_id = ?2",
                    params![artist_id.as_str(), track_id.as_str()],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                        ))
                    },
                )
                .optional()?;
            row.map(track_from_row).transpose()
        })
        .await
    }

    async fn store_track(&self, track: &Track) -> Result<()> {
        let track = track.clone();
        self.blocking(move |conn| {
            let existing: Option<TrackRow> = conn
                .query_row(
                    "SELECT artist_id, artist_track_id, artist_album_id,
                            album_track_number, title
                     FROM tracks WHERE artist_id = ?1 AND artist_track_id = ?2",
                    params![track.artist_id.as_str(), track.artist_track_id.as_str()],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                        ))
                    },
                )
                .optional()?;

            if let Some(row) = existing {
                if track_from_row(row)? == track {
                    return Ok(());
                }
            }

            conn.execute(
                "INSERT INTO tracks (artist_id, artist_track_id, artist_album_id,
                                     album_track_number, title, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(artist_id, artist_track_id) DO UPDATE SET
                    artist_album_id = excluded.artist_album_id,
                    album_track_number = excluded.album_track_number,
                    title = excluded.title,
                    updated_at = excluded.updated_at",
                params![
                    track.artist_id.as_str(),
                    track.artist_track_id.as_str(),
                    track.artist_album_id.as_ref().map(|id| id.as_str()),
                    track.album_track_number as i64,
                    &track.title,
                    now_millis(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_tracks(&self, since: Option<i64>) -> Result<Vec<Track>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT artist_id, artist_track_id, artist_album_id,
                        album_track_number, title
                 FROM tracks WHERE updated_at >= ?1
                 ORDER BY artist_id, artist_track_id",
            )?;
            let rows = stmt
                .query_map(params![since.unwrap_or(i64::MIN)], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<TrackRow>>>()?;
            rows.into_iter().map(track_from_row).collect()
        })
        .await
    }

    async fn store_track_payload(
        &self,
        artist_id: &ArtistId,
        track_id: &TrackId,
        payload: &[u8],
    ) -> Result<()> {
        let artist_id = artist_id.clone();
        let track_id = track_id.clone();
        let payload = payload.to_vec();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO track_payloads (artist_id, artist_track_id, payload, stored_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(artist_id, artist_track_id) DO UPDATE SET
                    payload = excluded.payload,
                    stored_at = excluded.stored_at",
                params![artist_id.as_str(), track_id.as_str(), payload, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_track_payload(
        &self,
        artist_id: &ArtistId,
        track_id: &TrackId,
    ) -> Result<Option<Vec<u8>>> {
        let artist_id = artist_id.clone();
        let track_id = track_id.clone();
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT payload FROM track_payloads
                 WHERE artist_id = ?1 AND artist_track_id = ?2",
                params![artist_id.as_str(), track_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_peers(&self) -> Result<Vec<Peer>> {
        self.blocking(move |conn| {
            let mut stmt =
                conn.prepare("SELECT pubkey, host, port FROM peers ORDER BY pubkey")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(pubkey, host, port)| {
                    Ok(Peer {
                        pubkey: parse_pubkey(pubkey)?,
                        host,
                        port: u16::try_from(port).map_err(|_| {
                            StoreError::InvalidData("peer port out of range".into())
                        })?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn store_peer(&self, peer: &Peer) -> Result<()> {
        let peer = peer.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO peers (pubkey, host, port, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(pubkey) DO UPDATE SET
                    host = excluded.host,
                    port = excluded.port,
                    updated_at = excluded.updated_at",
                params![
                    peer.pubkey.as_bytes().as_slice(),
                    &peer.host,
                    peer.port as i64,
                    now_millis(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn store_publication(&self, publication: &Publication) -> Result<InsertOutcome> {
        let publication = publication.clone();
        self.blocking(move |conn| {
            let id = publication.compute_id();

            let existing: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT publication_id FROM publications WHERE publication_id = ?1",
                    params![id.0.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;

            if existing.is_some() {
                return Ok(InsertOutcome::AlreadyExists);
            }

            conn.execute(
                "INSERT INTO publications (
                    publication_id, artist_id, artist_name, artist_pubkey,
                    signature, serialized_snapshot, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.0.as_slice(),
                    publication.artist.artist_id.as_str(),
                    &publication.artist.name,
                    publication
                        .artist
                        .pubkey
                        .as_ref()
                        .map(|k| k.as_bytes().as_slice()),
                    publication.signature.to_bytes().as_slice(),
                    publication.serialized_snapshot.as_ref(),
                    now_millis(),
                ],
            )?;

            Ok(InsertOutcome::Inserted)
        })
        .await
    }

    async fn latest_publication(&self, artist_id: &ArtistId) -> Result<Option<Publication>> {
        let artist_id = artist_id.clone();
        self.blocking(move |conn| {
            let row: Option<PublicationRow> = conn
                .query_row(
                    "SELECT artist_id, artist_name, artist_pubkey, signature,
                            serialized_snapshot
                     FROM publications WHERE artist_id = ?1
                     ORDER BY stored_at DESC, rowid DESC LIMIT 1",
                    params![artist_id.as_str()],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                        ))
                    },
                )
                .optional()?;
            row.map(publication_from_row).transpose()
        })
        .await
    }

    async fn get_publication(&self, id: &PublicationId) -> Result<Option<Publication>> {
        let id = *id;
        self.blocking(move |conn| {
            let row: Option<PublicationRow> = conn
                .query_row(
                    "SELECT artist_id, artist_name, artist_pubkey, signature,
                            serialized_snapshot
                     FROM publications WHERE publication_id = ?1",
                    params![id.0.as_slice()],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                        ))
                    },
                )
                .optional()?;
            row.map(publication_from_row).transpose()
        })
        .await
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
    use artel_core::{snapshot_bytes, CatalogSnapshot, Keypair};

    fn artist(id: &str, name: &str) -> Artist {
        Artist {
            artist_id: ArtistId::parse(id).unwrap(),
            name: name.into(),
            pubkey: None,
        }
    }

    #[tokio::test]
    async fn test_artist_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let mut a = artist("aliceinchains", "Alice In Chains");
        a.pubkey = Some(Keypair::from_seed(&[7; 32]).public_key());

        store.store_artist(&a).await.unwrap();
        let got = store.get_artist(&a.artist_id).await.unwrap().unwrap();
        assert_eq!(got, a);

        let missing = ArtistId::parse("nobody").unwrap();
        assert!(store.get_artist(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_album_tracks_survive_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let album = Album {
            artist_id: ArtistId::parse("aliceinchains").unwrap(),
            artist_album_id: AlbumId::parse("dirt").unwrap(),
            title: "Dirt".into(),
            tracks: vec![
                TrackId::parse("dirt/themrocks").unwrap(),
                TrackId::parse("dirt/would").unwrap(),
            ],
        };
        store.store_album(&album).await.unwrap();

        let got = store
            .get_album(&album.artist_id, &album.artist_album_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, album);
    }

    #[tokio::test]
    async fn test_track_roundtrip_standalone_and_album() {
        let store = SqliteStore::open_memory().unwrap();
        let on_album = Track {
            artist_id: ArtistId::parse("aliceinchains").unwrap(),
            artist_album_id: Some(AlbumId::parse("dirt").unwrap()),
            artist_track_id: TrackId::parse("dirt/would").unwrap(),
            album_track_number: 12,
            title: "Would?".into(),
        };
        let standalone = Track {
            artist_id: ArtistId::parse("aliceinchains").unwrap(),
            artist_album_id: None,
            artist_track_id: TrackId::parse("whatthehellhavei").unwrap(),
            album_track_number: 0,
            title: "What the Hell Have I".into(),
        };
        store.store_track(&on_album).await.unwrap();
        store.store_track(&standalone).await.unwrap();

        let tracks = store.list_tracks(None).await.unwrap();
        assert_eq!(tracks, vec![on_album, standalone]);
    }

    #[tokio::test]
    async fn test_unchanged_upsert_keeps_timestamp() {
        let store = SqliteStore::open_memory().unwrap();
        let a = artist("aliceinchains", "Alice In Chains");
        store.store_artist(&a).await.unwrap();

        let stamp = |store: &SqliteStore| {
            let conn = store.conn.lock().unwrap();
            conn.query_row(
                "SELECT updated_at FROM artists WHERE artist_id = 'aliceinchains'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .unwrap()
        };
        let before = stamp(&store);

        store.store_artist(&a).await.unwrap();
        assert_eq!(stamp(&store), before);
    }

    #[tokio::test]
    async fn test_publication_append_only() {
        let store = SqliteStore::open_memory().unwrap();
        let keypair = Keypair::from_seed(&[3; 32]);
        let mut a = artist("aliceinchains", "Alice In Chains");
        a.pubkey = Some(keypair.public_key());

        let snapshot = CatalogSnapshot::new(vec![a.clone()], vec![], vec![], vec![]);
        let serialized = snapshot_bytes(&snapshot);
        let publication = Publication {
            artist: a.clone(),
            signature: keypair.sign(&serialized),
            serialized_snapshot: Bytes::from(serialized),
        };

        let r1 = store.store_publication(&publication).await.unwrap();
        assert_eq!(r1, InsertOutcome::Inserted);
        let r2 = store.store_publication(&publication).await.unwrap();
        assert_eq!(r2, InsertOutcome::AlreadyExists);

        let latest = store
            .latest_publication(&a.artist_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest, publication);

        let by_id = store
            .get_publication(&publication.compute_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id, publication);
    }

    #[tokio::test]
    async fn test_corrupt_peer_port_is_invalid_data() {
        let store = SqliteStore::open_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO peers (pubkey, host, port, updated_at)
                 VALUES (?1, 'peer.example.onion', 70000, 0)",
                params![[7u8; 32].as_slice()],
            )
            .unwrap();
        }

        let err = store.get_peers().await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .store_artist(&artist("aliceinchains", "Alice In Chains"))
                .await
                .unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        let artists = reopened.list_artists(None).await.unwrap();
        assert_eq!(artists.len(), 1);
    }
}
