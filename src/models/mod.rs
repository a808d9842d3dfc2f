pub mod request;
pub mod track;

pub use request::{
    HealthResponse, IngestRequest, IngestResponse, RecognizeRequest, RecognizeResponse,
};
pub use track::{TrackMeta, TrackRecord};
