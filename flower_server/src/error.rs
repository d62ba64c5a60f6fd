use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use flower_prediction::PredictionFailure;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Prediction failed: {0}")]
    Prediction(#[from] PredictionFailure),
    #[error("Prediction timed out after {0:?}")]
    Timeout(Duration),
    #[error("Prediction worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    #[error("No image file in upload")]
    MissingFile,
    #[error("Invalid multipart upload: {0}")]
    Multipart(#[from] MultipartError),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Prediction(_) | ApiError::Timeout(_) | ApiError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::MissingFile => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Multipart(err) => err.status(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Rejected request: {}", self);
        }
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
