use std::collections::HashMap;

use crate::analysis::peaks::Peak;
use crate::error::{RecognitionError, Result};
use crate::params::HashingParams;

/// Widest frame delta the 12-bit field of the packed hash can carry.
pub const MAX_DELTA_T: u32 = 4095;

const FREQ_FIELD_BITS: u32 = 10;
const FREQ_FIELD_MAX: u32 = (1 << FREQ_FIELD_BITS) - 1;

/// A bag of hash tokens keyed by the packed 32-bit value.
///
/// The payload is the anchor frame plus the owning track for reference audio,
/// or `None` for queries. Collisions within one call are last-write-wins on
/// both sides, so at most one anchor frame survives per hash value.
pub type HashBag = HashMap<u32, (u32, Option<u64>)>;

/// Pack `(anchor_q, target_q, delta_t)` into one 32-bit token:
/// bits 0-9 anchor, 10-19 target, 20-31 delta.
pub fn pack_hash(anchor_q: u32, target_q: u32, delta_t: u32) -> u32 {
    anchor_q | (target_q << FREQ_FIELD_BITS) | (delta_t << (2 * FREQ_FIELD_BITS))
}

/// Inverse of [`pack_hash`] on `[0, 1023]^2 x [0, 4095]`.
pub fn unpack_hash(hash_val: u32) -> (u32, u32, u32) {
    (
        hash_val & FREQ_FIELD_MAX,
        (hash_val >> FREQ_FIELD_BITS) & FREQ_FIELD_MAX,
        hash_val >> (2 * FREQ_FIELD_BITS),
    )
}

/// Quantize a frequency in Hz into the 10-bit hash field.
///
/// The scale tops out a little above Nyquist so real bin centers never
/// saturate the field.
pub fn quantize_freq(freq_hz: f32, sr: u32) -> u32 {
    let max_freq = (sr as f32 / 2.0).ceil() + 10.0;
    let q = ((freq_hz / max_freq) * (1 << FREQ_FIELD_BITS) as f32).floor();
    (q.max(0.0) as u32).min(FREQ_FIELD_MAX)
}

/// Pair every anchor with the targets in its forward fan-out zone and emit
/// packed hash tokens.
///
/// `peaks` must be time-sorted; the target scan for an anchor stops at the
/// first peak more than `fanout_t` frames ahead. Targets closer than two
/// frames or at least `fanout_f` Hz away are skipped.
pub fn create_hashes(
    peaks: &[Peak],
    track_id: Option<u64>,
    sr: u32,
    hashing: &HashingParams,
) -> Result<HashBag> {
    if sr == 0 {
        return Err(RecognitionError::BadInput(
            "sample rate must be positive".to_string(),
        ));
    }
    if hashing.fanout_t > MAX_DELTA_T {
        return Err(RecognitionError::BadInput(format!(
            "fanout_t {} exceeds the {MAX_DELTA_T}-frame hash field",
            hashing.fanout_t
        )));
    }

    let mut bag = HashBag::new();
    for (i, anchor) in peaks.iter().enumerate() {
        for target in &peaks[i + 1..] {
            let dt = target.t_idx as i64 - anchor.t_idx as i64;
            if dt <= 1 {
                continue;
            }
            if dt > hashing.fanout_t as i64 {
                // Peaks are time-sorted, so no later target can qualify.
                break;
            }
            if (target.freq_hz - anchor.freq_hz).abs() >= hashing.fanout_f {
                continue;
            }

            let hash_val = pack_hash(
                quantize_freq(anchor.freq_hz, sr),
                quantize_freq(target.freq_hz, sr),
                dt as u32,
            );
            bag.insert(hash_val, (anchor.t_idx, track_id));
        }
    }

    tracing::debug!("hashed {} peaks into {} tokens", peaks.len(), bag.len());
    Ok(bag)
}
