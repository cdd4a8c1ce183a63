// Worker binary entry point: consumes one runner queue and logs each job

use anyhow::Result;
use board::config::Settings;
use board::models::DeliveredJob;
use board::store::RedisStore;
use board::telemetry;
use board::{Board, Format, JobHandler, ListenConfig};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().map_err(|e| anyhow::anyhow!("configuration error: {}", e))?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    telemetry::init_logging(&settings.observability.log_level)?;

    let format: Format = settings
        .consumer
        .format
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid consumer format: {}", e))?;

    info!(
        board = %settings.board.name,
        queue = %settings.consumer.queue,
        format = %format,
        "Starting board worker"
    );

    let store = RedisStore::new(&settings.redis).await.map_err(|e| {
        error!(error = %e, "Failed to connect to the store");
        anyhow::anyhow!(e)
    })?;
    store.health_check().await?;
    info!("Store connection verified");

    let board = Board::new(settings.board.name.clone(), Arc::new(store));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, initiating graceful shutdown");
        let _ = shutdown_tx.send(());
    });

    let handler: JobHandler = Arc::new(|job: DeliveredJob| {
        async move {
            info!(
                job_id = %job.job_id,
                runner = %job.runner,
                payload = %job.payload,
                "Job received"
            );
            Ok(())
        }
        .boxed()
    });

    board
        .respond(
            &settings.consumer.queue,
            ListenConfig {
                format,
                poll_timeout: Duration::from_secs(settings.consumer.pop_timeout_seconds),
            },
            handler,
            shutdown_rx,
        )
        .await?;

    info!("Worker stopped");
    Ok(())
}
