pub mod health;
pub mod params;
pub mod recognize;
pub mod tracks;

use std::sync::Arc;

use crate::index::SqliteIndex;
use crate::params::ParameterStore;

/// Shared handler state: the fingerprint index and the tuning document.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<SqliteIndex>,
    pub params: Arc<ParameterStore>,
}
