use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{RecognitionError, Result};
use crate::index::{FingerprintIndex, Posting};
use crate::models::{TrackMeta, TrackRecord};

/// Point lookups repeat heavily inside one recognition call; a small cache
/// in front of the postings table absorbs them. Cleared on every write.
const POSTINGS_CACHE_CAPACITY: usize = 4096;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tracks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    source_url  TEXT NOT NULL UNIQUE,
    title       TEXT NOT NULL,
    artist      TEXT NOT NULL,
    artwork_url TEXT NOT NULL,
    audio_path  TEXT NOT NULL,
    duration_s  REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS hashes (
    hash_val   INTEGER NOT NULL,
    time_stamp INTEGER NOT NULL,
    track_id   INTEGER NOT NULL
);
";

/// Embedded SQLite implementation of [`FingerprintIndex`].
///
/// A single connection serializes all writers; parallel ingest workers
/// contend on the mutex rather than on SQLite's own locking.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    postings_cache: Mutex<LruCache<u32, Arc<Vec<Posting>>>>,
}

impl SqliteIndex {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Purely in-memory index, used by tests and throwaway catalogs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            postings_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(POSTINGS_CACHE_CAPACITY).expect("cache capacity is non-zero"),
            )),
        })
    }

    fn invalidate_cache(&self) {
        self.postings_cache.lock().clear();
    }
}

impl FingerprintIndex for SqliteIndex {
    fn put_track(&self, meta: &TrackMeta) -> Result<(u64, bool)> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO tracks (source_url, title, artist, artwork_url, audio_path, duration_s)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                meta.source_url,
                meta.title,
                meta.artist,
                meta.artwork_url,
                meta.audio_path,
                meta.duration_s,
            ],
        );

        match inserted {
            Ok(_) => Ok((conn.last_insert_rowid() as u64, false)),
            Err(rusqlite::Error::SqliteFailure(cause, _))
                if cause.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                // Uniqueness on source_url: resolve to the existing row.
                let track_id: i64 = conn.query_row(
                    "SELECT id FROM tracks WHERE source_url = ?1",
                    params![meta.source_url],
                    |row| row.get(0),
                )?;
                Ok((track_id as u64, true))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn put_hashes(&self, postings: &[Posting]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO hashes (hash_val, time_stamp, track_id) VALUES (?1, ?2, ?3)",
            )?;
            for posting in postings {
                stmt.execute(params![
                    posting.hash_val,
                    posting.anchor_t,
                    posting.track_id as i64,
                ])?;
            }
        }
        tx.commit()?;
        drop(conn);

        self.invalidate_cache();
        tracing::debug!("stored {} postings", postings.len());
        Ok(())
    }

    fn get_postings(&self, hash_val: u32) -> Result<Vec<Posting>> {
        if let Some(hit) = self.postings_cache.lock().get(&hash_val) {
            return Ok(hit.to_vec());
        }

        let postings = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare_cached(
                "SELECT hash_val, time_stamp, track_id FROM hashes WHERE hash_val = ?1",
            )?;
            let rows = stmt.query_map(params![hash_val], |row| {
                Ok(Posting {
                    hash_val: row.get::<_, u32>(0)?,
                    anchor_t: row.get::<_, u32>(1)?,
                    track_id: row.get::<_, i64>(2)? as u64,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        self.postings_cache
            .lock()
            .put(hash_val, Arc::new(postings.clone()));
        Ok(postings)
    }

    fn create_hash_index(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_hash_val ON hashes(hash_val)",
            [],
        )?;
        Ok(())
    }

    fn get_track(&self, track_id: u64) -> Result<Option<TrackRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT id, source_url, title, artist, artwork_url, audio_path, duration_s
                 FROM tracks WHERE id = ?1",
                params![track_id as i64],
                |row| {
                    Ok(TrackRecord {
                        track_id: row.get::<_, i64>(0)? as u64,
                        meta: TrackMeta {
                            source_url: row.get(1)?,
                            title: row.get(2)?,
                            artist: row.get(3)?,
                            artwork_url: row.get(4)?,
                            audio_path: row.get(5)?,
                            duration_s: row.get(6)?,
                        },
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn list_tracks(&self) -> Result<Vec<u64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT id FROM tracks ORDER BY id ASC")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(|id| id as u64).collect())
    }

    fn delete_track(&self, track_id: u64) -> Result<()> {
        let deleted = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM hashes WHERE track_id = ?1",
                params![track_id as i64],
            )?;
            let deleted = tx.execute("DELETE FROM tracks WHERE id = ?1", params![track_id as i64])?;
            tx.commit()?;
            deleted
        };

        if deleted == 0 {
            return Err(RecognitionError::NotFound(format!(
                "track {track_id} does not exist"
            )));
        }
        self.invalidate_cache();
        Ok(())
    }
}
