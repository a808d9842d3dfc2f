use axum::{extract::State, Json};

use crate::api::AppState;
use crate::error::{RecognitionError, Result};
use crate::index::FingerprintIndex;
use crate::models::{RecognizeRequest, RecognizeResponse};
use crate::recognizer::recognize_file;

/// Identify the catalog track behind a query recording.
///
/// The best hypothesis is returned even at low confidence; calibrating the
/// raw histogram score is the caller's concern. 404 when the catalog offers
/// no candidate at all.
pub async fn recognize_handler(
    State(state): State<AppState>,
    Json(req): Json<RecognizeRequest>,
) -> Result<Json<RecognizeResponse>> {
    tracing::debug!("recognition request for {}", req.filepath);

    // Parameters are (re)read at the start of every core operation.
    let params = state.params.load()?;
    let index = state.index.clone();
    let filepath = req.filepath.clone();

    let (best, track) = tokio::task::spawn_blocking(move || {
        let recognition = recognize_file(index.as_ref(), &filepath, &params)?;
        let best = recognition.best().ok_or_else(|| {
            RecognitionError::NotFound("no catalog track matched the query".to_string())
        })?;
        let track = index.get_track(best.track_id)?.ok_or_else(|| {
            RecognitionError::NotFound(format!("track {} vanished from catalog", best.track_id))
        })?;
        Ok::<_, RecognitionError>((best, track))
    })
    .await
    .map_err(|e| RecognitionError::Internal(format!("task join error: {e}")))??;

    Ok(Json(RecognizeResponse {
        best: best.track_id,
        confidence: best.score as f32,
        url: track.meta.source_url,
        title: track.meta.title,
    }))
}
