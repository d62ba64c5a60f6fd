use crate::{config::Config, routes::api_routes, telemetry::Metrics};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use flower_prediction::{ClassifierModel, Predictor};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub struct SharedState<M: ClassifierModel> {
    pub predictor: Predictor<M>,
    pub metrics: Arc<Metrics>,
    pub prediction_timeout: Duration,
}

impl<M: ClassifierModel> Clone for SharedState<M> {
    fn clone(&self) -> Self {
        Self {
            predictor: self.predictor.clone(),
            metrics: self.metrics.clone(),
            prediction_timeout: self.prediction_timeout,
        }
    }
}

pub fn build_router<M: ClassifierModel>(state: SharedState<M>, max_body_bytes: usize) -> Router {
    Router::new()
        .merge(api_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(HttpMetricsLayerBuilder::new().build())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<M: ClassifierModel>(
        predictor: Predictor<M>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        let app_state = SharedState {
            predictor,
            metrics: Arc::new(Metrics::new()?),
            prediction_timeout: config.prediction.get_timeout(),
        };
        let router = build_router(app_state, config.server.max_body_bytes);

        let listener = TcpListener::bind(&addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}
