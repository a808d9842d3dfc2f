use serde::{Deserialize, Serialize};

/// Catalog metadata for one reference recording.
///
/// `source_url` is the uniqueness key: inserting the same URL twice resolves
/// to the already-stored track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMeta {
    pub source_url: String,
    pub title: String,
    pub artist: String,
    pub artwork_url: String,
    pub audio_path: String,
    pub duration_s: f64,
}

/// A stored track row with its surrogate id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track_id: u64,
    #[serde(flatten)]
    pub meta: TrackMeta,
}
