use crate::{error::ApiError, server::SharedState};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    Json,
};
use flower_prediction::{ClassProbabilities, ClassifierModel};
use serde::Serialize;
use std::time::Instant;
use tracing::instrument;

/// Multipart field expected to carry the image.
const UPLOAD_FIELD: &str = "file";

#[derive(Serialize, Debug)]
pub struct PredictionResponse {
    pub predictions: ClassProbabilities,
}

/// Returns the `file` part, or the first part carrying a filename.
async fn read_upload(mut multipart: Multipart) -> Result<Bytes, ApiError> {
    let mut fallback = None;
    while let Some(field) = multipart.next_field().await? {
        let is_upload_field = field.name() == Some(UPLOAD_FIELD);
        if is_upload_field || (fallback.is_none() && field.file_name().is_some()) {
            let data = field.bytes().await?;
            if is_upload_field {
                return Ok(data);
            }
            fallback = Some(data);
        }
    }
    fallback.ok_or(ApiError::MissingFile)
}

#[instrument(skip(state, multipart))]
pub async fn predict<M: ClassifierModel>(
    State(state): State<SharedState<M>>,
    multipart: Multipart,
) -> Result<Json<PredictionResponse>, ApiError> {
    state.metrics.record_request("/predict");

    let image_data = read_upload(multipart).await?;
    tracing::info!("Image uploaded ({} bytes)", image_data.len());

    // Decode and inference are CPU bound; keep them off the async workers.
    let predictor = state.predictor.clone();
    let started = Instant::now();
    let task = tokio::task::spawn_blocking(move || predictor.predict_bytes(&image_data));

    // A timed out task keeps running to completion on the blocking pool.
    let outcome = tokio::time::timeout(state.prediction_timeout, task)
        .await
        .map_err(|_| {
            state.metrics.record_prediction_failure("timeout");
            ApiError::Timeout(state.prediction_timeout)
        })?;
    state
        .metrics
        .record_prediction_duration(started.elapsed().as_millis() as u64);

    let predictions = outcome?.inspect_err(|failure| {
        state.metrics.record_prediction_failure(failure.kind());
    })?;

    if let Some((label, probability)) = predictions.top() {
        tracing::info!("Predicted {} ({:.3})", label, probability);
    }

    Ok(Json(PredictionResponse { predictions }))
}
