use axum::{response::IntoResponse, response::Json};
use flower_prediction::FLOWER_CLASSES;
use serde::Serialize;

#[derive(Serialize)]
pub struct Status {
    status: &'static str,
    classes: &'static [&'static str],
}

pub async fn healthcheck() -> impl IntoResponse {
    Json(Status {
        status: "Available",
        classes: &FLOWER_CLASSES,
    })
}
