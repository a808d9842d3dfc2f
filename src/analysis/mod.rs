pub mod hashing;
pub mod peaks;
pub mod spectrogram;

pub use hashing::{create_hashes, pack_hash, unpack_hash, HashBag};
pub use peaks::{find_peaks, Peak};
pub use spectrogram::{compute_spectrogram, default_hop_length, Spectrogram, DEFAULT_N_FFT};
