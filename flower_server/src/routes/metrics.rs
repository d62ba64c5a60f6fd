use crate::server::SharedState;
use axum::{extract::State, http::StatusCode};
use flower_prediction::ClassifierModel;

pub async fn metrics_handler<M: ClassifierModel>(
    State(state): State<SharedState<M>>,
) -> Result<String, (StatusCode, String)> {
    state.metrics.encode().map_err(|e| {
        tracing::error!("Failed to encode metrics: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}
