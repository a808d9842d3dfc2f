use serde::{Deserialize, Serialize};

use crate::ingest::IngestStatus;
use crate::models::track::TrackMeta;

#[derive(Debug, Serialize, Deserialize)]
pub struct RecognizeRequest {
    pub filepath: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecognizeResponse {
    pub best: u64,
    pub confidence: f32,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestRequest {
    pub source_url: String,
    pub title: String,
    pub artist: String,
    pub artwork_url: String,
    pub audio_path: String,
}

impl From<IngestRequest> for TrackMeta {
    fn from(req: IngestRequest) -> Self {
        TrackMeta {
            source_url: req.source_url,
            title: req.title,
            artist: req.artist,
            artwork_url: req.artwork_url,
            audio_path: req.audio_path,
            // Measured from the decoded audio during ingest.
            duration_s: 0.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: IngestStatus,
    pub track_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
}
