use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("failed to decode audio: {0}")]
    DecodeFailed(String),

    #[error("storage busy: {0}")]
    StorageBusy(String),

    #[error("storage corrupt: {0}")]
    StorageCorrupt(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for RecognitionError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match &err {
            rusqlite::Error::SqliteFailure(cause, _) => match cause.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    RecognitionError::StorageBusy(err.to_string())
                }
                ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                    RecognitionError::StorageCorrupt(err.to_string())
                }
                _ => RecognitionError::Internal(err.to_string()),
            },
            rusqlite::Error::QueryReturnedNoRows => {
                RecognitionError::NotFound("row not found".to_string())
            }
            _ => RecognitionError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for RecognitionError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            RecognitionError::BadInput(msg) => (StatusCode::BAD_REQUEST, msg),
            RecognitionError::DecodeFailed(msg) => (StatusCode::BAD_REQUEST, msg),
            RecognitionError::StorageBusy(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            RecognitionError::StorageCorrupt(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            RecognitionError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            RecognitionError::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            RecognitionError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RecognitionError>;
