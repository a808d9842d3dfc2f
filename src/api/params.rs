use axum::{extract::State, http::StatusCode, Json};

use crate::api::AppState;
use crate::error::Result;
use crate::params::Parameters;

pub async fn get_params_handler(State(state): State<AppState>) -> Result<Json<Parameters>> {
    Ok(Json(state.params.load()?))
}

pub async fn put_params_handler(
    State(state): State<AppState>,
    Json(params): Json<Parameters>,
) -> Result<StatusCode> {
    state.params.set(&params)?;
    tracing::info!("parameter document updated");
    Ok(StatusCode::NO_CONTENT)
}
