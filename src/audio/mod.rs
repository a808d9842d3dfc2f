pub mod loader;

pub use loader::{load_audio, load_audio_sync, resample_linear, AudioData};

/// Analysis rate of the whole engine. Reference and query audio are both
/// resampled here before fingerprinting, capping usable frequencies at the
/// 5512.5 Hz Nyquist limit.
pub const ENGINE_SAMPLE_RATE: u32 = 11025;
