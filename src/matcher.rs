use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::analysis::HashBag;
use crate::error::Result;
use crate::index::FingerprintIndex;

/// Per-track scatter of `(source_t, query_t)` frame pairs. Set semantics:
/// repeated identical pairs add no evidence and are stored once.
pub type TimePairBins = HashMap<u64, HashSet<(u32, u32)>>;

/// Ranked candidates plus the raw evidence behind them.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// `(track_id, score)` sorted by score descending, ties by track id.
    pub ranked: Vec<(u64, u32)>,
    pub bins: TimePairBins,
}

impl MatchOutcome {
    pub fn empty() -> Self {
        Self {
            ranked: Vec::new(),
            bins: TimePairBins::new(),
        }
    }
}

/// Diagnostic heuristics for one candidate, derived from its pair bin.
#[derive(Debug, Clone, Serialize)]
pub struct MatchMetrics {
    /// Matched `(source_t, query_t)` pairs for the candidate.
    pub n_hash_matches: usize,
    /// `n_hash_matches / n_query_hashes`, capped at 1.
    pub prop_hash_matches: f64,
    /// Spread of the suggested offsets in milliseconds, capped at 1000.
    /// Near-zero for a true match, near the cap for unrelated audio.
    pub std_of_delta_ms: f64,
}

/// Look up every query hash and detect the dominant diagonal per track.
///
/// For each posting the `(source_t, query_t)` pair lands in the owning
/// track's bin; a true match concentrates `deltaT = source_t - query_t` at
/// a single offset, so the track's score is the tallest bucket of the
/// `deltaT` histogram. Hashes with no postings are skipped silently; an
/// empty query bag yields an empty outcome.
pub fn score_hashes(index: &dyn FingerprintIndex, query: &HashBag) -> Result<MatchOutcome> {
    let mut bins = TimePairBins::new();

    for (&hash_val, &(query_t, _)) in query {
        let postings = index.get_postings(hash_val)?;
        for posting in postings {
            bins.entry(posting.track_id)
                .or_default()
                .insert((posting.anchor_t, query_t));
        }
    }

    let mut ranked: Vec<(u64, u32)> = bins
        .iter()
        .map(|(&track_id, pairs)| (track_id, histogram_peak(pairs)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    tracing::debug!(
        "matched {} query hashes against {} candidate tracks",
        query.len(),
        ranked.len()
    );
    Ok(MatchOutcome { ranked, bins })
}

/// Height of the tallest bucket in a linear histogram of `deltaT` values.
///
/// Bucket count is `max(unique(deltaT), 10)` over edges spanning min..max;
/// the rightmost edge is inclusive.
fn histogram_peak(pairs: &HashSet<(u32, u32)>) -> u32 {
    let deltas: Vec<i64> = pairs
        .iter()
        .map(|&(source_t, query_t)| source_t as i64 - query_t as i64)
        .collect();
    if deltas.is_empty() {
        return 0;
    }

    let mut unique = deltas.clone();
    unique.sort_unstable();
    unique.dedup();
    let min = unique[0];
    let max = unique[unique.len() - 1];
    if min == max {
        return deltas.len() as u32;
    }

    let buckets = unique.len().max(10);
    let width = (max - min) as f64 / buckets as f64;
    let mut counts = vec![0u32; buckets];
    for delta in deltas {
        let slot = (((delta - min) as f64) / width) as usize;
        counts[slot.min(buckets - 1)] += 1;
    }
    counts.into_iter().max().unwrap_or(0)
}

/// Compute the diagnostic heuristics for one ranked candidate.
///
/// Returns `None` when the track has no pair bin. `hop_length` and `sr`
/// convert frame offsets into milliseconds.
pub fn match_metrics(
    bins: &TimePairBins,
    track_id: u64,
    n_query_hashes: usize,
    hop_length: usize,
    sr: u32,
) -> Option<MatchMetrics> {
    let pairs = bins.get(&track_id)?;
    let n_hash_matches = pairs.len();

    let prop_hash_matches = if n_query_hashes == 0 {
        0.0
    } else {
        (n_hash_matches as f64 / n_query_hashes as f64).min(1.0)
    };

    let deltas: Vec<f64> = pairs
        .iter()
        .map(|&(source_t, query_t)| (source_t as i64 - query_t as i64) as f64)
        .collect();
    let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
    let variance = deltas.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / deltas.len() as f64;
    let frame_ms = 1000.0 * hop_length as f64 / sr as f64;
    let std_of_delta_ms = (variance.sqrt() * frame_ms).min(1000.0);

    Some(MatchMetrics {
        n_hash_matches,
        prop_hash_matches,
        std_of_delta_ms,
    })
}
