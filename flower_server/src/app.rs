use crate::config::Config;
use crate::server::HttpServer;
use flower_prediction::{OrtClassifier, Predictor};
use std::sync::Arc;
use tokio::signal;

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    // Serving without a model is not allowed, so a load failure aborts startup.
    let model = match OrtClassifier::load(&config.model) {
        Ok(model) => Arc::new(model),
        Err(e) => {
            tracing::error!("Failed to load classifier model: {}", e);
            return Err(e.into());
        }
    };
    let predictor = Predictor::new(model);

    let server = HttpServer::new(predictor, &config).await?;
    server.run(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown.");
}
