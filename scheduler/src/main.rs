// Scheduler binary entry point: periodic tick driver for one board

use anyhow::Result;
use board::config::Settings;
use board::scheduler::{TickDriver, TickDriverConfig, TickScheduler};
use board::store::RedisStore;
use board::telemetry;
use board::Board;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().map_err(|e| anyhow::anyhow!("configuration error: {}", e))?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    telemetry::init_logging(&settings.observability.log_level)?;
    telemetry::init_metrics(settings.observability.metrics_port)?;

    info!(
        board = %settings.board.name,
        redis_url = %settings.redis.url,
        tick_interval_seconds = settings.scheduler.tick_interval_seconds,
        "Starting board scheduler"
    );

    let store = RedisStore::new(&settings.redis).await.map_err(|e| {
        error!(error = %e, "Failed to connect to the store");
        anyhow::anyhow!(e)
    })?;
    store.health_check().await?;
    info!("Store connection verified");

    let board = Board::new(settings.board.name.clone(), Arc::new(store));
    let driver = Arc::new(TickDriver::new(
        TickDriverConfig {
            tick_interval_seconds: settings.scheduler.tick_interval_seconds,
        },
        board,
    ));

    // Ctrl+C triggers a graceful stop; the loop finishes its current pass.
    let driver_for_shutdown = driver.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, initiating graceful shutdown");
        driver_for_shutdown.stop();
    });

    driver.start().await?;

    info!("Scheduler stopped");
    Ok(())
}
