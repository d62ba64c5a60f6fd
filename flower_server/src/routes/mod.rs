mod health;
mod metrics;
mod predict;
mod root;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use flower_prediction::ClassifierModel;

pub fn api_routes<M: ClassifierModel>() -> Router<SharedState<M>> {
    Router::new()
        .route("/", get(root::welcome))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler::<M>))
        .route("/predict", post(predict::predict::<M>))
}
