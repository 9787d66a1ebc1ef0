//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Get current version
    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    // Apply migrations
    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Artists, keyed by URL-safe slug
        CREATE TABLE artists (
            artist_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            pubkey BLOB,                      -- 32 bytes, NULL until registered
            updated_at INTEGER NOT NULL       -- local modification time (Unix ms)
        );

        -- Albums, scoped under an artist
        CREATE TABLE albums (
            artist_id TEXT NOT NULL,
            artist_album_id TEXT NOT NULL,
            title TEXT NOT NULL,
            tracks BLOB NOT NULL,             -- CBOR array of track ids
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (artist_id, artist_album_id)
        );

        -- Tracks, scoped under an artist
        CREATE TABLE tracks (
            artist_id TEXT NOT NULL,
            artist_track_id TEXT NOT NULL,
            artist_album_id TEXT,             -- NULL for standalone tracks
            album_track_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (artist_id, artist_track_id)
        );

        -- Audio payloads, stored separately from track metadata
        CREATE TABLE track_payloads (
            artist_id TEXT NOT NULL,
            artist_track_id TEXT NOT NULL,
            payload BLOB NOT NULL,
            stored_at INTEGER NOT NULL,
            PRIMARY KEY (artist_id, artist_track_id)
        );

        -- Known peers, one row per identity
        CREATE TABLE peers (
            pubkey BLOB PRIMARY KEY,          -- 32 bytes
            host TEXT NOT NULL,
            port INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Signed publications, append-only, keyed by content address
        CREATE TABLE publications (
            publication_id BLOB PRIMARY KEY,  -- 32 bytes, Blake3 of snapshot || signature
            artist_id TEXT NOT NULL,
            artist_name TEXT NOT NULL,
            artist_pubkey BLOB,               -- 32 bytes, nullable
            signature BLOB NOT NULL,          -- 96 bytes, signer pubkey || signature
            serialized_snapshot BLOB NOT NULL,
            stored_at INTEGER NOT NULL
        );

        -- Indexes for common queries
        CREATE INDEX idx_albums_artist ON albums(artist_id);
        CREATE INDEX idx_tracks_artist ON tracks(artist_id);
        CREATE INDEX idx_artists_updated ON artists(updated_at);
        CREATE INDEX idx_albums_updated ON albums(updated_at);
        CREATE INDEX idx_tracks_updated ON tracks(updated_at);
        CREATE INDEX idx_publications_artist ON publications(artist_id, stored_at);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
