use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::api::AppState;
use crate::error::{RecognitionError, Result};
use crate::index::FingerprintIndex;
use crate::ingest::ingest_track;
use crate::models::{IngestRequest, IngestResponse, TrackMeta, TrackRecord};

/// Register and fingerprint a reference track.
///
/// The audio must already be on local disk (downloading is outside this
/// service); re-posting a known source URL reports `exists` and leaves the
/// stored fingerprints untouched.
pub async fn ingest_handler(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    tracing::debug!("ingest request for {}", req.source_url);

    let params = state.params.load()?;
    let index = state.index.clone();
    let meta = TrackMeta::from(req);

    let outcome = tokio::task::spawn_blocking(move || {
        let outcome = ingest_track(index.as_ref(), &meta, &params)?;
        index.create_hash_index()?;
        Ok::<_, RecognitionError>(outcome)
    })
    .await
    .map_err(|e| RecognitionError::Internal(format!("task join error: {e}")))??;

    Ok((
        StatusCode::OK,
        Json(IngestResponse {
            status: outcome.status,
            track_id: outcome.track_id,
        }),
    ))
}

pub async fn list_tracks_handler(State(state): State<AppState>) -> Result<Json<Vec<u64>>> {
    Ok(Json(state.index.list_tracks()?))
}

pub async fn get_track_handler(
    State(state): State<AppState>,
    Path(track_id): Path<u64>,
) -> Result<Json<TrackRecord>> {
    let record = state
        .index
        .get_track(track_id)?
        .ok_or_else(|| RecognitionError::NotFound(format!("track {track_id} does not exist")))?;
    Ok(Json(record))
}

pub async fn delete_track_handler(
    State(state): State<AppState>,
    Path(track_id): Path<u64>,
) -> Result<StatusCode> {
    state.index.delete_track(track_id)?;
    tracing::info!("deleted track {} and its postings", track_id);
    Ok(StatusCode::NO_CONTENT)
}
