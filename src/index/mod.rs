pub mod sqlite;

pub use sqlite::SqliteIndex;

use crate::error::Result;
use crate::models::{TrackMeta, TrackRecord};

/// One stored occurrence of a hash: the token, the anchor frame it was
/// emitted at, and the track that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub hash_val: u32,
    pub anchor_t: u32,
    pub track_id: u64,
}

/// Persistent multimap from hash values to postings plus the track catalog.
///
/// The index is append-only during ingest; queries never mutate it. All
/// implementations must make `put_hashes` atomic per call and keep lookups
/// linearizable with respect to completed puts.
pub trait FingerprintIndex: Send + Sync {
    /// Insert a track row and return `(track_id, existed)`.
    ///
    /// When the source-URL uniqueness constraint fires this resolves to the
    /// already-stored track without error, with `existed = true` so callers
    /// can short-circuit re-fingerprinting.
    fn put_track(&self, meta: &TrackMeta) -> Result<(u64, bool)>;

    /// Bulk-insert postings. Duplicate postings are allowed; the call is
    /// all-or-nothing under failure.
    fn put_hashes(&self, postings: &[Posting]) -> Result<()>;

    /// All postings for a hash value, in unspecified order.
    fn get_postings(&self, hash_val: u32) -> Result<Vec<Posting>>;

    /// Ensure the secondary index on `hash_val` exists. Idempotent; lookups
    /// stay correct without it, only slower.
    fn create_hash_index(&self) -> Result<()>;

    fn get_track(&self, track_id: u64) -> Result<Option<TrackRecord>>;

    fn list_tracks(&self) -> Result<Vec<u64>>;

    /// Remove a track and every posting that references it.
    fn delete_track(&self, track_id: u64) -> Result<()>;
}
