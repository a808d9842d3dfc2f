use std::fs::File;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::probe::Hint;

use crate::error::{RecognitionError, Result};

/// Decoded mono audio ready for the fingerprint pipeline.
#[derive(Debug, Clone)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration_s(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Load audio from a file path, downmixed to mono.
///
/// Supports every container symphonia probes (WAV, FLAC, MP3, AAC, OGG, ...).
/// With `target_rate` set the samples are resampled to that rate; the engine
/// runs at [`crate::audio::ENGINE_SAMPLE_RATE`].
pub async fn load_audio(filepath: &str, target_rate: Option<u32>) -> Result<AudioData> {
    let filepath = filepath.to_string();
    tokio::task::spawn_blocking(move || load_audio_sync(&filepath, target_rate))
        .await
        .map_err(|e| RecognitionError::Internal(format!("task join error: {e}")))?
}

pub fn load_audio_sync(filepath: &str, target_rate: Option<u32>) -> Result<AudioData> {
    if !std::path::Path::new(filepath).exists() {
        return Err(RecognitionError::NotFound(format!(
            "audio file {filepath} does not exist"
        )));
    }
    tracing::debug!("loading audio from {}", filepath);

    let file = File::open(filepath)?;
    let source = ReadOnlySource::new(file);
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = std::path::Path::new(filepath).extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &Default::default())
        .map_err(|e| RecognitionError::DecodeFailed(format!("failed to probe format: {e}")))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.sample_rate.is_some())
        .ok_or_else(|| RecognitionError::DecodeFailed("no audio tracks found".to_string()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| RecognitionError::DecodeFailed("no sample rate found".to_string()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| RecognitionError::DecodeFailed(format!("decoder error: {e}")))?;

    let mut samples = Vec::new();
    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() != track_id {
                    continue;
                }
                match decoder.decode(&packet) {
                    Ok(buf) => collect_mono(&mut samples, &buf),
                    // Skip frames that cannot be decoded.
                    Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
                    Err(e) => return Err(RecognitionError::DecodeFailed(e.to_string())),
                }
            }
            Err(symphonia::core::errors::Error::IoError(_)) => break,
            Err(symphonia::core::errors::Error::Unsupported(_)) => break,
            Err(e) => return Err(RecognitionError::DecodeFailed(e.to_string())),
        }
    }

    if samples.is_empty() {
        return Err(RecognitionError::DecodeFailed(
            "no audio samples decoded".to_string(),
        ));
    }
    if !samples.iter().all(|s| s.is_finite()) {
        return Err(RecognitionError::DecodeFailed(
            "audio contains NaN or infinite values".to_string(),
        ));
    }

    let mut audio = AudioData {
        samples,
        sample_rate,
    };
    if let Some(rate) = target_rate {
        if rate == 0 {
            return Err(RecognitionError::BadInput(
                "target sample rate must be positive".to_string(),
            ));
        }
        if rate != audio.sample_rate {
            audio = AudioData {
                samples: resample_linear(&audio.samples, audio.sample_rate, rate),
                sample_rate: rate,
            };
        }
    }

    tracing::debug!(
        "loaded {} samples at {} Hz from {}",
        audio.samples.len(),
        audio.sample_rate,
        filepath
    );
    Ok(audio)
}

/// Average all channels of a decoded buffer into the mono sample stream.
fn collect_mono(samples: &mut Vec<f32>, buf: &AudioBufferRef) {
    macro_rules! process_buffer {
        ($buf:expr, $norm_fn:expr) => {{
            let n_frames = $buf.frames();
            let channels = $buf.spec().channels.count();
            if n_frames == 0 || channels == 0 {
                return;
            }
            for frame_idx in 0..n_frames {
                let mut sum = 0.0f32;
                for ch in 0..channels {
                    sum += $norm_fn($buf.chan(ch)[frame_idx]);
                }
                samples.push(sum / channels as f32);
            }
        }};
    }

    match buf {
        AudioBufferRef::F32(fbuf) => process_buffer!(fbuf, |v: f32| v),
        AudioBufferRef::F64(fbuf) => process_buffer!(fbuf, |v: f64| v as f32),
        AudioBufferRef::S8(ibuf) => process_buffer!(ibuf, |v: i8| v as f32 / i8::MAX as f32),
        AudioBufferRef::S16(ibuf) => process_buffer!(ibuf, |v: i16| v as f32 / i16::MAX as f32),
        AudioBufferRef::S24(ibuf) => process_buffer!(ibuf, |v: symphonia::core::sample::i24| {
            v.into_i32() as f32 / ((1 << 23) - 1) as f32
        }),
        AudioBufferRef::S32(ibuf) => process_buffer!(ibuf, |v: i32| v as f32 / i32::MAX as f32),
        AudioBufferRef::U8(ubuf) => {
            process_buffer!(ubuf, |v: u8| (v as f32 / u8::MAX as f32 - 0.5) * 2.0)
        }
        AudioBufferRef::U16(ubuf) => {
            process_buffer!(ubuf, |v: u16| (v as f32 / u16::MAX as f32 - 0.5) * 2.0)
        }
        AudioBufferRef::U24(ubuf) => process_buffer!(ubuf, |v: symphonia::core::sample::u24| {
            (v.into_u32() as f32 / ((1u32 << 24) - 1) as f32 - 0.5) * 2.0
        }),
        AudioBufferRef::U32(ubuf) => {
            process_buffer!(ubuf, |v: u32| (v as f64 / u32::MAX as f64 - 0.5) as f32 * 2.0)
        }
    }
}

/// Linear-interpolation resampler.
///
/// Adequate for the engine's 11 kHz analysis rate; decode-side anti-alias
/// filtering is the decoder's concern.
pub fn resample_linear(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if samples.is_empty() || src_rate == dst_rate {
        return samples.to_vec();
    }
    let step = src_rate as f64 / dst_rate as f64;
    let out_len = ((samples.len() as f64 / step).floor() as usize).max(1);

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(samples.len() - 1)];
            let b = samples[(idx + 1).min(samples.len() - 1)];
            a + (b - a) * frac
        })
        .collect()
}
