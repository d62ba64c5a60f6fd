mod error;
mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod config;

pub use app::start_app;
pub use error::ApiError;
pub use server::{build_router, HttpServer, SharedState};
pub use telemetry::Metrics;
