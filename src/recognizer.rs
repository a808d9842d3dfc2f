use serde::Serialize;

use crate::analysis::{
    compute_spectrogram, create_hashes, default_hop_length, find_peaks, DEFAULT_N_FFT,
};
use crate::audio::{load_audio_sync, ENGINE_SAMPLE_RATE};
use crate::error::Result;
use crate::index::FingerprintIndex;
use crate::matcher::{self, TimePairBins};
use crate::params::Parameters;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrackScore {
    pub track_id: u64,
    pub score: u32,
}

/// Outcome of one recognition call: ranked hypotheses plus the raw pair
/// bins for secondary heuristics.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub ranked: Vec<TrackScore>,
    pub bins: TimePairBins,
    pub n_query_hashes: usize,
}

impl Recognition {
    fn empty() -> Self {
        Self {
            ranked: Vec::new(),
            bins: TimePairBins::new(),
            n_query_hashes: 0,
        }
    }

    pub fn best(&self) -> Option<TrackScore> {
        self.ranked.first().copied()
    }
}

/// Recognize a query clip already decoded to mono samples.
///
/// Empty or all-silent input is not an error: it yields an empty ranked
/// list, as does querying an empty catalog.
pub fn recognize_samples(
    index: &dyn FingerprintIndex,
    samples: &[f32],
    sr: u32,
    params: &Parameters,
) -> Result<Recognition> {
    if samples.is_empty() || samples.iter().all(|&s| s == 0.0) {
        tracing::debug!("query is empty or silent; skipping recognition");
        return Ok(Recognition::empty());
    }

    let spec = compute_spectrogram(samples, sr, DEFAULT_N_FFT, default_hop_length(DEFAULT_N_FFT))?;
    let peaks = find_peaks(&spec, &params.constellation_mapping)?;
    let query = create_hashes(&peaks, None, sr, &params.hashing)?;
    let n_query_hashes = query.len();

    let outcome = matcher::score_hashes(index, &query)?;

    if let Some(&(track_id, score)) = outcome.ranked.first() {
        tracing::info!(
            "recognition: best candidate track {} with score {} from {} query hashes",
            track_id,
            score,
            n_query_hashes
        );
    } else {
        tracing::info!("recognition: no candidates for {} query hashes", n_query_hashes);
    }

    Ok(Recognition {
        ranked: outcome
            .ranked
            .into_iter()
            .map(|(track_id, score)| TrackScore { track_id, score })
            .collect(),
        bins: outcome.bins,
        n_query_hashes,
    })
}

/// Recognize a query clip from an audio file, resampled to the engine rate.
pub fn recognize_file(
    index: &dyn FingerprintIndex,
    filepath: &str,
    params: &Parameters,
) -> Result<Recognition> {
    let audio = load_audio_sync(filepath, Some(ENGINE_SAMPLE_RATE))?;
    recognize_samples(index, &audio.samples, audio.sample_rate, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SqliteIndex;

    #[test]
    fn test_silence_yields_empty_result() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let params = Parameters::default();

        let silent = vec![0.0f32; ENGINE_SAMPLE_RATE as usize];
        let recognition =
            recognize_samples(&index, &silent, ENGINE_SAMPLE_RATE, &params).unwrap();
        assert!(recognition.ranked.is_empty());
        assert_eq!(recognition.n_query_hashes, 0);

        let recognition = recognize_samples(&index, &[], ENGINE_SAMPLE_RATE, &params).unwrap();
        assert!(recognition.ranked.is_empty());
        assert!(recognition.best().is_none());
    }

    #[test]
    fn test_empty_catalog_yields_empty_ranking() {
        let index = SqliteIndex::open_in_memory().unwrap();
        let params = Parameters::default();

        let tone: Vec<f32> = (0..ENGINE_SAMPLE_RATE as usize * 5)
            .map(|n| {
                (2.0 * std::f32::consts::PI * 880.0 * n as f32 / ENGINE_SAMPLE_RATE as f32).sin()
            })
            .collect();
        let recognition = recognize_samples(&index, &tone, ENGINE_SAMPLE_RATE, &params).unwrap();
        assert!(recognition.ranked.is_empty());
        assert!(recognition.n_query_hashes > 0);
    }
}
