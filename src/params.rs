use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RecognitionError, Result};

/// Frequency-bin bands used for peak picking with the default 1024-point FFT.
/// Rough log split so low-frequency energy cannot monopolize the constellation.
pub const DEFAULT_BANDS: [(usize, usize); 6] =
    [(0, 10), (10, 20), (20, 40), (40, 80), (80, 160), (160, 512)];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstellationParams {
    /// Width of one peak-picking tile, in time frames.
    pub cm_window_size: usize,
    /// Top-K magnitude candidates taken per band per tile.
    pub candidates_per_band: usize,
    /// Ordered, non-overlapping `[f_start, f_end)` bin ranges.
    pub bands: Vec<(usize, usize)>,
}

impl Default for ConstellationParams {
    fn default() -> Self {
        Self {
            cm_window_size: 10,
            candidates_per_band: 6,
            bands: DEFAULT_BANDS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashingParams {
    /// Maximum frame delta between an anchor and its targets.
    pub fanout_t: u32,
    /// Maximum absolute frequency delta between an anchor and its targets, in Hz.
    pub fanout_f: f32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            fanout_t: 100,
            fanout_f: 1500.0,
        }
    }
}

/// The full tuning document, persisted as JSON and loaded at the start of
/// every core operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Parameters {
    pub constellation_mapping: ConstellationParams,
    pub hashing: HashingParams,
}

/// Keyed JSON document on disk holding the engine tuning.
///
/// Reads lazily initialize the file: a missing or malformed document is
/// replaced with the defaults and those defaults are returned, so every
/// pipeline stage can assume a well-formed parameter set.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    path: PathBuf,
}

impl ParameterStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole document, writing defaults back if it is missing or
    /// cannot be parsed.
    pub fn load(&self) -> Result<Parameters> {
        match fs::read_to_string(&self.path) {
            Ok(text) => match serde_json::from_str::<Parameters>(&text) {
                Ok(params) => Ok(params),
                Err(err) => {
                    tracing::warn!(
                        "malformed parameter document at {}: {}; resetting to defaults",
                        self.path.display(),
                        err
                    );
                    self.reset_to_defaults()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => self.reset_to_defaults(),
            Err(err) => Err(RecognitionError::Io(err)),
        }
    }

    /// Overwrite the document with the given options.
    pub fn set(&self, params: &Parameters) -> Result<()> {
        let text = serde_json::to_string_pretty(params)
            .map_err(|e| RecognitionError::Internal(format!("serialize parameters: {e}")))?;
        fs::write(&self.path, text)?;
        Ok(())
    }

    /// Peak-picking section of the document.
    pub fn constellation(&self) -> Result<ConstellationParams> {
        Ok(self.load()?.constellation_mapping)
    }

    /// Hashing section of the document.
    pub fn hashing(&self) -> Result<HashingParams> {
        Ok(self.load()?.hashing)
    }

    fn reset_to_defaults(&self) -> Result<Parameters> {
        let params = Parameters::default();
        self.set(&params)?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_initializes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParameterStore::new(dir.path().join("parameters.json"));

        let params = store.load().unwrap();
        assert_eq!(params, Parameters::default());
        assert_eq!(params.constellation_mapping.cm_window_size, 10);
        assert_eq!(params.constellation_mapping.candidates_per_band, 6);
        assert_eq!(params.hashing.fanout_t, 100);
        assert_eq!(params.hashing.fanout_f, 1500.0);

        // The document must now exist on disk.
        assert!(store.path().exists());
    }

    #[test]
    fn test_malformed_document_resets_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parameters.json");
        fs::write(&path, "{not json").unwrap();

        let store = ParameterStore::new(&path);
        assert_eq!(store.load().unwrap(), Parameters::default());

        // The file was repaired in place.
        let text = fs::read_to_string(&path).unwrap();
        assert!(serde_json::from_str::<Parameters>(&text).is_ok());
    }

    #[test]
    fn test_set_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParameterStore::new(dir.path().join("parameters.json"));

        let mut params = Parameters::default();
        params.constellation_mapping.cm_window_size = 5;
        params.constellation_mapping.bands = vec![(0, 20), (20, 40), (40, 512)];
        params.hashing.fanout_t = 50;
        params.hashing.fanout_f = 3000.0;

        store.set(&params).unwrap();
        assert_eq!(store.load().unwrap(), params);
        assert_eq!(store.constellation().unwrap().cm_window_size, 5);
        assert_eq!(store.hashing().unwrap().fanout_t, 50);
    }

    #[test]
    fn test_document_shape_is_sectioned() {
        let text = serde_json::to_string(&Parameters::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(value.get("constellation_mapping").is_some());
        assert!(value.get("hashing").is_some());
        assert_eq!(
            value["constellation_mapping"]["bands"][0],
            serde_json::json!([0, 10])
        );
    }
}
