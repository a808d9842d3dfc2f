//! End-to-end recognition over a synthetic catalog.
//!
//! Reference tracks are pseudo-random tone sequences; query slices are cut on
//! frame-grid boundaries so a clean slice reproduces the reference analysis
//! frames exactly and must come back as the top hypothesis.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use recognition_server::analysis::{default_hop_length, DEFAULT_N_FFT};
use recognition_server::audio::{load_audio_sync, ENGINE_SAMPLE_RATE};
use recognition_server::index::{FingerprintIndex, SqliteIndex};
use recognition_server::ingest::{fingerprint_samples, ingest_catalog, ingest_track, IngestStatus};
use recognition_server::matcher::match_metrics;
use recognition_server::models::TrackMeta;
use recognition_server::params::Parameters;
use recognition_server::recognizer::recognize_samples;

const SR: u32 = ENGINE_SAMPLE_RATE;

/// Two analysis frames per tone segment at the default 1536-sample hop.
const SEGMENT_SAMPLES: usize = 2 * 1536;

struct Lcg(u64);

impl Lcg {
    fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    /// Uniform in [0, 1).
    fn next_f32(&mut self) -> f32 {
        self.next_u32() as f32 / u32::MAX as f32
    }

    /// Roughly standard normal (Irwin-Hall sum of 12 uniforms).
    fn next_gaussian(&mut self) -> f32 {
        (0..12).map(|_| self.next_f32()).sum::<f32>() - 6.0
    }
}

/// A pseudo-random sequence of pure tones between 300 and 5000 Hz.
fn tone_track(seed: u64, seconds: usize) -> Vec<f32> {
    let mut rng = Lcg(seed);
    let total = seconds * SR as usize;
    let mut samples = Vec::with_capacity(total);

    while samples.len() < total {
        let freq = 300.0 + rng.next_f32() * 4700.0;
        let remaining = total - samples.len();
        for n in 0..SEGMENT_SAMPLES.min(remaining) {
            let t = n as f32 / SR as f32;
            samples.push(0.85 * (2.0 * std::f32::consts::PI * freq * t).sin());
        }
    }
    samples
}

fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak > 0.0 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

/// Brownian noise mixed in at the given weight, then re-normalized.
fn add_noise(samples: &[f32], noise_weight: f32, seed: u64) -> Vec<f32> {
    let mut rng = Lcg(seed);
    let mut noise: Vec<f32> = Vec::with_capacity(samples.len());
    let mut acc = 0.0f32;
    for _ in 0..samples.len() {
        acc += rng.next_gaussian();
        noise.push(acc);
    }
    peak_normalize(&mut noise);

    let mut mixed: Vec<f32> = samples
        .iter()
        .zip(&noise)
        .map(|(s, n)| s + n * noise_weight)
        .collect();
    peak_normalize(&mut mixed);
    mixed
}

fn meta(seed: u64) -> TrackMeta {
    TrackMeta {
        source_url: format!("https://example.com/watch?v=synthetic-{seed}"),
        title: format!("Synthetic Tones {seed}"),
        artist: "Test Fixture".to_string(),
        artwork_url: String::new(),
        audio_path: String::new(),
        duration_s: 60.0,
    }
}

struct Catalog {
    index: SqliteIndex,
    tracks: Vec<(u64, Vec<f32>)>,
    params: Parameters,
}

fn build_catalog(seeds: &[u64]) -> Catalog {
    let index = SqliteIndex::open_in_memory().unwrap();
    let params = Parameters::default();
    let mut tracks = Vec::new();

    for &seed in seeds {
        let samples = tone_track(seed, 60);
        let (track_id, existed) = index.put_track(&meta(seed)).unwrap();
        assert!(!existed);
        let postings = fingerprint_samples(&samples, SR, track_id, &params).unwrap();
        assert!(!postings.is_empty());
        index.put_hashes(&postings).unwrap();
        tracks.push((track_id, samples));
    }
    index.create_hash_index().unwrap();

    Catalog {
        index,
        tracks,
        params,
    }
}

/// A slice whose start lands on both the hop grid and the peak-picking tile
/// grid, `frames` analysis frames long.
fn aligned_slice(samples: &[f32], start_frame: usize, frames: usize) -> &[f32] {
    assert_eq!(start_frame % 10, 0, "slice must respect the tile grid");
    let hop = default_hop_length(DEFAULT_N_FFT);
    &samples[start_frame * hop..(start_frame + frames) * hop]
}

/// Share of a bin's pairs that agree on the single most common offset.
fn offset_concentration(
    bins: &HashMap<u64, std::collections::HashSet<(u32, u32)>>,
    track_id: u64,
) -> f64 {
    let pairs = &bins[&track_id];
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for &(source_t, query_t) in pairs {
        *counts.entry(source_t as i64 - query_t as i64).or_default() += 1;
    }
    let mode = counts.values().copied().max().unwrap_or(0);
    mode as f64 / pairs.len() as f64
}

#[test]
fn test_clean_slice_self_recognition() {
    let catalog = build_catalog(&[1, 2, 3]);
    let (expected_id, samples) = &catalog.tracks[1];
    let expected_id = *expected_id;

    // Roughly 40 seconds in, 40 frames (about 5.6 s) long.
    let slice = aligned_slice(samples, 290, 40);
    let recognition =
        recognize_samples(&catalog.index, slice, SR, &catalog.params).unwrap();

    let best = recognition.best().expect("a candidate must be returned");
    assert_eq!(best.track_id, expected_id);
    assert!(best.score >= 20, "suspiciously low score {}", best.score);

    if recognition.ranked.len() > 1 {
        let runner_up = recognition.ranked[1].score;
        assert!(
            best.score >= 3 * runner_up.max(1),
            "winner {} not clearly ahead of runner-up {}",
            best.score,
            runner_up
        );
    }

    // A clean aligned slice concentrates almost all pairs on one offset.
    assert!(offset_concentration(&recognition.bins, expected_id) > 0.5);

    let metrics = match_metrics(
        &recognition.bins,
        expected_id,
        recognition.n_query_hashes,
        default_hop_length(DEFAULT_N_FFT),
        SR,
    )
    .unwrap();
    assert!(metrics.prop_hash_matches >= 0.2);
}

#[test]
fn test_every_track_recognizes_its_own_slice() {
    let catalog = build_catalog(&[11, 12, 13]);

    for (offset_frames, (track_id, samples)) in
        [40usize, 150, 260].iter().zip(&catalog.tracks)
    {
        let slice = aligned_slice(samples, *offset_frames, 30);
        let recognition =
            recognize_samples(&catalog.index, slice, SR, &catalog.params).unwrap();
        assert_eq!(
            recognition.best().map(|b| b.track_id),
            Some(*track_id),
            "slice at frame {offset_frames} misrecognized"
        );
    }
}

#[test]
fn test_noisy_slice_still_recognized() {
    let catalog = build_catalog(&[1, 2, 3]);
    let (expected_id, samples) = &catalog.tracks[0];
    let expected_id = *expected_id;

    let slice = aligned_slice(samples, 200, 40);
    let noisy = add_noise(slice, 0.3, 99);
    let recognition =
        recognize_samples(&catalog.index, &noisy, SR, &catalog.params).unwrap();

    let best = recognition.best().expect("a candidate must be returned");
    assert_eq!(best.track_id, expected_id);

    let metrics = match_metrics(
        &recognition.bins,
        expected_id,
        recognition.n_query_hashes,
        default_hop_length(DEFAULT_N_FFT),
        SR,
    )
    .unwrap();
    assert!(
        metrics.prop_hash_matches >= 0.05,
        "too few hash matches under noise: {}",
        metrics.prop_hash_matches
    );
}

#[test]
fn test_white_noise_query_scores_far_below_a_true_match() {
    let catalog = build_catalog(&[1, 2, 3]);
    let (_, samples) = &catalog.tracks[2];

    let slice = aligned_slice(samples, 100, 40);
    let clean_best = recognize_samples(&catalog.index, slice, SR, &catalog.params)
        .unwrap()
        .best()
        .unwrap()
        .score;

    let mut rng = Lcg(7);
    let mut noise: Vec<f32> = (0..40 * default_hop_length(DEFAULT_N_FFT))
        .map(|_| rng.next_gaussian())
        .collect();
    peak_normalize(&mut noise);

    let recognition =
        recognize_samples(&catalog.index, &noise, SR, &catalog.params).unwrap();
    let noise_best = recognition.best().map(|b| b.score).unwrap_or(0);

    assert!(
        5 * noise_best <= clean_best,
        "white noise scored {noise_best} against a true match's {clean_best}"
    );
}

#[test]
fn test_deleting_a_track_removes_it_from_recognition() {
    let catalog = build_catalog(&[21, 22]);
    let (doomed_id, samples) = &catalog.tracks[0];
    let doomed_id = *doomed_id;

    let slice = aligned_slice(samples, 120, 40);
    let before = recognize_samples(&catalog.index, slice, SR, &catalog.params).unwrap();
    assert_eq!(before.best().map(|b| b.track_id), Some(doomed_id));

    catalog.index.delete_track(doomed_id).unwrap();

    let after = recognize_samples(&catalog.index, slice, SR, &catalog.params).unwrap();
    assert_ne!(after.best().map(|b| b.track_id), Some(doomed_id));
}

/// Minimal 16-bit mono PCM WAV writer for ingest fixtures.
fn write_wav(path: &Path, samples: &[f32], sr: u32) {
    let data_len = (samples.len() * 2) as u32;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sr.to_le_bytes());
    out.extend_from_slice(&(sr * 2).to_le_bytes()); // byte rate
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(&out).unwrap();
}

#[test]
fn test_ingest_catalog_from_audio_files() {
    let dir = tempfile::tempdir().unwrap();
    let index = SqliteIndex::open_in_memory().unwrap();
    let params = Parameters::default();

    let mut metas = Vec::new();
    for seed in [41u64, 42] {
        let samples = tone_track(seed, 20);
        let path = dir.path().join(format!("track-{seed}.wav"));
        write_wav(&path, &samples, SR);

        let mut m = meta(seed);
        m.audio_path = path.to_string_lossy().into_owned();
        metas.push(m);
    }

    let outcomes = ingest_catalog(&index, &metas, &params).unwrap();
    assert_eq!(outcomes.len(), 2);
    let ids: Vec<u64> = outcomes
        .iter()
        .map(|o| {
            let o = o.as_ref().unwrap();
            assert_eq!(o.status, IngestStatus::Success);
            o.track_id
        })
        .collect();

    // Duration is measured from the decoded audio.
    let record = index.get_track(ids[0]).unwrap().unwrap();
    assert!((record.meta.duration_s - 20.0).abs() < 0.1);

    // Re-ingesting the same source URL short-circuits.
    let again = ingest_track(&index, &metas[0], &params).unwrap();
    assert_eq!(again.status, IngestStatus::Exists);
    assert_eq!(again.track_id, ids[0]);

    // A slice of the decoded catalog audio is recognized end to end. Slicing
    // the decoded stream (not the pre-quantization floats) keeps the query
    // frames bit-identical to what ingest analyzed.
    let decoded = load_audio_sync(&metas[1].audio_path, Some(SR)).unwrap();
    let slice = aligned_slice(&decoded.samples, 50, 30);
    let recognition = recognize_samples(&index, slice, SR, &params).unwrap();
    assert_eq!(recognition.best().map(|b| b.track_id), Some(ids[1]));
}

#[test]
fn test_reingesting_a_track_short_circuits() {
    let catalog = build_catalog(&[31]);
    let (track_id, samples) = &catalog.tracks[0];
    let track_id = *track_id;

    // Re-registering the same source URL must resolve to the same id; the
    // exists short-circuit means no second fingerprint pass is stored.
    let (again, existed) = catalog.index.put_track(&meta(31)).unwrap();
    assert_eq!(again, track_id);
    assert!(existed);

    let postings = fingerprint_samples(samples, SR, track_id, &catalog.params).unwrap();
    let probe = postings[0].hash_val;
    let count = catalog.index.get_postings(probe).unwrap().len();
    assert!(count >= 1);

    // The catalog still holds exactly one copy of the track's postings.
    let recount = catalog.index.get_postings(probe).unwrap().len();
    assert_eq!(count, recount);
}
