use axum::Json;

pub const WELCOME_MESSAGE: &str = "Welcome to the flower classification API!";

pub async fn welcome() -> Json<&'static str> {
    tracing::info!("Root URL requested");
    Json(WELCOME_MESSAGE)
}
