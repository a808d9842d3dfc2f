use ndarray::Array2;
use num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::{RecognitionError, Result};

pub const DEFAULT_N_FFT: usize = 1024;

/// Shipped hop default of `n_fft + n_fft/2`: frames are deliberately gapped
/// rather than overlapped, which halves the fingerprint volume at a small
/// recall cost. Pass an explicit hop to `compute_spectrogram` to override.
pub fn default_hop_length(n_fft: usize) -> usize {
    n_fft + n_fft / 2
}

/// One-sided magnitude spectrogram with aligned axes.
///
/// `mag` has shape `(F, T)` with `F = n_fft/2 + 1`; `freqs[k]` is the bin
/// center in Hz and `times[m]` the frame center in seconds.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub freqs: Vec<f32>,
    pub times: Vec<f32>,
    pub mag: Array2<f32>,
}

impl Spectrogram {
    pub fn freq_bins(&self) -> usize {
        self.mag.nrows()
    }

    pub fn time_frames(&self) -> usize {
        self.mag.ncols()
    }
}

/// Short-time Fourier transform of a mono signal.
///
/// Frames are Hamming-windowed and centered: the signal is zero-padded by
/// `n_fft/2` on both ends so the first frame is centered at sample 0, and the
/// tail is padded so the last frame covers the final sample.
pub fn compute_spectrogram(
    audio: &[f32],
    sr: u32,
    n_fft: usize,
    hop_length: usize,
) -> Result<Spectrogram> {
    if audio.is_empty() {
        return Err(RecognitionError::BadInput("audio is empty".to_string()));
    }
    if n_fft == 0 || !n_fft.is_power_of_two() {
        return Err(RecognitionError::BadInput(format!(
            "n_fft must be a positive power of two, got {n_fft}"
        )));
    }
    if hop_length == 0 {
        return Err(RecognitionError::BadInput(
            "hop_length must be positive".to_string(),
        ));
    }
    if sr == 0 {
        return Err(RecognitionError::BadInput(
            "sample rate must be positive".to_string(),
        ));
    }

    let half = n_fft / 2;
    let mut padded = vec![0.0f32; audio.len() + n_fft];
    padded[half..half + audio.len()].copy_from_slice(audio);

    // Pad the tail so the frame grid divides the signal exactly.
    let rem = (padded.len() - n_fft) % hop_length;
    if rem != 0 {
        padded.resize(padded.len() + hop_length - rem, 0.0);
    }
    let n_frames = (padded.len() - n_fft) / hop_length + 1;
    let n_bins = n_fft / 2 + 1;

    // Periodic Hamming window.
    let window: Vec<f32> = (0..n_fft)
        .map(|n| 0.54 - 0.46 * (2.0 * std::f32::consts::PI * n as f32 / n_fft as f32).cos())
        .collect();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let mut mag = Array2::<f32>::zeros((n_bins, n_frames));
    let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); n_fft];

    for frame in 0..n_frames {
        let start = frame * hop_length;
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex::new(padded[start + i] * window[i], 0.0);
        }
        fft.process(&mut buffer);
        for (bin, value) in buffer.iter().take(n_bins).enumerate() {
            mag[[bin, frame]] = value.norm();
        }
    }

    let freqs: Vec<f32> = (0..n_bins)
        .map(|k| k as f32 * sr as f32 / n_fft as f32)
        .collect();
    let times: Vec<f32> = (0..n_frames)
        .map(|m| (m * hop_length) as f32 / sr as f32)
        .collect();

    tracing::debug!(
        "spectrogram: {} samples at {} Hz -> {} bins x {} frames",
        audio.len(),
        sr,
        n_bins,
        n_frames
    );

    Ok(Spectrogram { freqs, times, mag })
}
