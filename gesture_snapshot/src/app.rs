use crate::config::Config;
use crate::prediction::PredictionClient;
use crate::server::HttpServer;
use crate::session::SessionStore;
use crate::telemetry::Metrics;

use std::{error::Error, sync::Arc, time::Duration};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let prediction_client = match PredictionClient::new(&config.prediction_service) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("Failed to initialize prediction client: {:?}", e);
            return Err(Box::new(e));
        }
    };
    tracing::info!(
        "Predictions will be sent to {}",
        prediction_client.endpoint()
    );

    let metrics = match Metrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            tracing::error!("Failed to initialize metrics: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let sessions = Arc::new(SessionStore::new(Duration::from_secs(
        config.session.idle_timeout_secs,
    )));

    let server = HttpServer::new(sessions, prediction_client, metrics.clone(), &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    match server_handle.await {
        Ok(Err(e)) => tracing::error!("HTTP server exited with error: {:?}", e),
        Err(e) => tracing::error!("HTTP server task failed: {:?}", e),
        Ok(Ok(())) => {}
    }
    metrics.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
