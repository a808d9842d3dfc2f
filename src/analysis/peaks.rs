use std::cmp::Ordering;

use crate::analysis::spectrogram::Spectrogram;
use crate::error::{RecognitionError, Result};
use crate::params::ConstellationParams;

/// Proportion of pooled tile candidates kept after magnitude ranking; the
/// weakest 5% are discarded.
const KEEP_PROPORTION: f64 = 0.95;

/// Dedup scans at most this many peaks ahead of each survivor.
const DEDUP_SCAN_AHEAD: usize = 15;
const DEDUP_MAX_DT_FRAMES: u32 = 10;
const DEDUP_MAX_DF_HZ: f32 = 300.0;

/// One constellation point: a frame index and a bin-center frequency in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub t_idx: u32,
    pub freq_hz: f32,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    mag: f32,
    f_idx: usize,
    t_idx: usize,
}

/// Select the constellation map from a magnitude spectrogram.
///
/// The time axis is cut into tiles of `cm_window_size` frames; within each
/// tile every band contributes its `candidates_per_band` strongest cells,
/// the pooled candidates are ranked by magnitude and the weakest 5% dropped.
/// The surviving peaks are time-sorted and thinned so no two remain within
/// 10 frames and 300 Hz of each other.
pub fn find_peaks(spec: &Spectrogram, cm: &ConstellationParams) -> Result<Vec<Peak>> {
    validate_bands(&cm.bands, spec.freq_bins())?;
    if cm.cm_window_size == 0 {
        return Err(RecognitionError::BadInput(
            "cm_window_size must be positive".to_string(),
        ));
    }

    let t_frames = spec.time_frames();
    let mut constellation: Vec<Peak> = Vec::new();

    for t_start in (0..t_frames).step_by(cm.cm_window_size) {
        let t_end = (t_start + cm.cm_window_size).min(t_frames);
        let mut tile: Vec<Candidate> = Vec::new();

        for &(f_start, f_end) in &cm.bands {
            tile.extend(band_top_k(
                spec,
                f_start..f_end,
                t_start..t_end,
                cm.candidates_per_band,
            ));
        }

        // Keep the strongest 95% of the pooled tile candidates.
        tile.sort_by(|a, b| b.mag.partial_cmp(&a.mag).unwrap_or(Ordering::Equal));
        let keep = (tile.len() as f64 * KEEP_PROPORTION).floor() as usize;
        tile.truncate(keep);

        constellation.extend(tile.into_iter().map(|c| Peak {
            t_idx: c.t_idx as u32,
            freq_hz: spec.freqs[c.f_idx],
        }));
    }

    constellation.sort_by_key(|p| p.t_idx);
    let peaks = dedup_peaks(constellation);

    tracing::debug!(
        "constellation: {} peaks over {} frames",
        peaks.len(),
        t_frames
    );
    Ok(peaks)
}

/// Strongest `k` cells of one tile-by-band sub-rectangle. Magnitude ties go
/// to the lower bin index, then the lower frame index.
fn band_top_k(
    spec: &Spectrogram,
    band: std::ops::Range<usize>,
    frames: std::ops::Range<usize>,
    k: usize,
) -> Vec<Candidate> {
    let mut cells: Vec<Candidate> = Vec::with_capacity(band.len() * frames.len());
    for f_idx in band {
        for t_idx in frames.clone() {
            cells.push(Candidate {
                mag: spec.mag[[f_idx, t_idx]],
                f_idx,
                t_idx,
            });
        }
    }
    cells.sort_by(|a, b| {
        b.mag
            .partial_cmp(&a.mag)
            .unwrap_or(Ordering::Equal)
            .then(a.f_idx.cmp(&b.f_idx))
            .then(a.t_idx.cmp(&b.t_idx))
    });
    cells.truncate(k);
    cells
}

/// Drop peaks that crowd an earlier surviving peak.
///
/// Scans up to 15 peaks ahead of each survivor in time order; a peak within
/// 10 frames and 300 Hz of the survivor is dropped, and a dropped peak
/// cannot itself suppress later peaks.
pub fn dedup_peaks(peaks: Vec<Peak>) -> Vec<Peak> {
    let mut dropped = vec![false; peaks.len()];
    for i in 0..peaks.len() {
        if dropped[i] {
            continue;
        }
        let end = (i + 1 + DEDUP_SCAN_AHEAD).min(peaks.len());
        for j in (i + 1)..end {
            if dropped[j] {
                continue;
            }
            let dt = peaks[j].t_idx.abs_diff(peaks[i].t_idx);
            let df = (peaks[j].freq_hz - peaks[i].freq_hz).abs();
            if dt <= DEDUP_MAX_DT_FRAMES && df <= DEDUP_MAX_DF_HZ {
                dropped[j] = true;
            }
        }
    }
    peaks
        .into_iter()
        .zip(dropped)
        .filter_map(|(p, d)| (!d).then_some(p))
        .collect()
}

fn validate_bands(bands: &[(usize, usize)], freq_bins: usize) -> Result<()> {
    if bands.is_empty() {
        return Err(RecognitionError::BadInput("no bands given".to_string()));
    }
    let mut prev_end = 0usize;
    for &(f_start, f_end) in bands {
        if f_start >= f_end {
            return Err(RecognitionError::BadInput(format!(
                "band [{f_start}, {f_end}) is empty or inverted"
            )));
        }
        if f_start < prev_end {
            return Err(RecognitionError::BadInput(format!(
                "band [{f_start}, {f_end}) overlaps or is out of order"
            )));
        }
        if f_end > freq_bins {
            return Err(RecognitionError::BadInput(format!(
                "band [{f_start}, {f_end}) extends past {freq_bins} frequency bins"
            )));
        }
        prev_end = f_end;
    }
    Ok(())
}
