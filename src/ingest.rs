use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{
    compute_spectrogram, create_hashes, default_hop_length, find_peaks, DEFAULT_N_FFT,
};
use crate::audio::{load_audio_sync, ENGINE_SAMPLE_RATE};
use crate::error::Result;
use crate::index::{FingerprintIndex, Posting};
use crate::models::TrackMeta;
use crate::params::Parameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Success,
    Exists,
}

#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    pub track_id: u64,
    pub status: IngestStatus,
}

/// Fingerprint decoded reference audio into postings for one track.
pub fn fingerprint_samples(
    samples: &[f32],
    sr: u32,
    track_id: u64,
    params: &Parameters,
) -> Result<Vec<Posting>> {
    let spec = compute_spectrogram(samples, sr, DEFAULT_N_FFT, default_hop_length(DEFAULT_N_FFT))?;
    let peaks = find_peaks(&spec, &params.constellation_mapping)?;
    let bag = create_hashes(&peaks, Some(track_id), sr, &params.hashing)?;

    Ok(bag
        .into_iter()
        .map(|(hash_val, (anchor_t, _))| Posting {
            hash_val,
            anchor_t,
            track_id,
        })
        .collect())
}

/// Decode, register and fingerprint one reference track.
///
/// When the source URL is already cataloged the call short-circuits with
/// [`IngestStatus::Exists`] and stores no new postings, so re-ingesting a
/// track never duplicates its hashes. The track's duration is measured from
/// the decoded audio rather than trusted from the caller.
pub fn ingest_track(
    index: &dyn FingerprintIndex,
    meta: &TrackMeta,
    params: &Parameters,
) -> Result<IngestOutcome> {
    let audio = load_audio_sync(&meta.audio_path, Some(ENGINE_SAMPLE_RATE))?;

    let mut meta = meta.clone();
    meta.duration_s = audio.duration_s();

    let (track_id, existed) = index.put_track(&meta)?;
    if existed {
        tracing::info!("track {} already cataloged as {}", meta.source_url, track_id);
        return Ok(IngestOutcome {
            track_id,
            status: IngestStatus::Exists,
        });
    }

    let postings = fingerprint_samples(&audio.samples, audio.sample_rate, track_id, params)?;
    index.put_hashes(&postings)?;

    tracing::info!(
        "ingested '{}' by '{}' as track {} ({} postings)",
        meta.title,
        meta.artist,
        track_id,
        postings.len()
    );
    Ok(IngestOutcome {
        track_id,
        status: IngestStatus::Success,
    })
}

/// Ingest a batch of reference tracks on a worker pool.
///
/// Decoding and DSP run in parallel per track; index writes serialize inside
/// the storage layer with `put_hashes` as the atomic unit. Failures are
/// isolated per track and reported in the returned vector, which preserves
/// input order. The hash index is (re)built once after the pool drains.
pub fn ingest_catalog(
    index: &dyn FingerprintIndex,
    metas: &[TrackMeta],
    params: &Parameters,
) -> Result<Vec<Result<IngestOutcome>>> {
    let outcomes: Vec<Result<IngestOutcome>> = metas
        .par_iter()
        .map(|meta| {
            ingest_track(index, meta, params).map_err(|err| {
                tracing::warn!("failed to ingest {}: {}", meta.source_url, err);
                err
            })
        })
        .collect();

    index.create_hash_index()?;
    Ok(outcomes)
}
