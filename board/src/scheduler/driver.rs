// Periodic tick driver
//
// Calls Board::tick on a fixed interval. Duplicate or concurrent drivers are
// safe: the scan-and-promote pass is one atomic store operation, so
// overlapping ticks never promote the same due occurrence twice. Store
// failures back off exponentially; an empty board does not.

use crate::board::Board;
use crate::errors::BoardError;
use crate::retry::{ExponentialBackoff, RetryStrategy};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the tick driver.
#[derive(Debug, Clone)]
pub struct TickDriverConfig {
    /// How often to tick, in seconds.
    pub tick_interval_seconds: u64,
}

impl Default for TickDriverConfig {
    fn default() -> Self {
        Self {
            tick_interval_seconds: 1,
        }
    }
}

/// Scheduling driver operations.
#[async_trait]
pub trait TickScheduler: Send + Sync {
    /// Run the tick loop until shutdown.
    async fn start(&self) -> Result<(), BoardError>;

    /// Request graceful shutdown of the tick loop.
    fn stop(&self);

    /// Run one promotion pass; returns the promoted count.
    async fn tick_once(&self) -> Result<u64, BoardError>;
}

/// Periodic tick driver bound to one board.
pub struct TickDriver {
    config: TickDriverConfig,
    board: Board,
    backoff: ExponentialBackoff,
    shutdown_tx: broadcast::Sender<()>,
}

impl TickDriver {
    pub fn new(config: TickDriverConfig, board: Board) -> Self {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        Self {
            config,
            board,
            backoff: ExponentialBackoff::default(),
            shutdown_tx,
        }
    }

    /// A receiver for the driver's shutdown signal, usable by collaborating
    /// loops (e.g. a listener sharing the process).
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}

#[async_trait]
impl TickScheduler for TickDriver {
    #[instrument(skip(self), fields(board = %self.board.name()))]
    async fn start(&self) -> Result<(), BoardError> {
        info!(
            tick_interval_seconds = self.config.tick_interval_seconds,
            "Starting tick driver"
        );

        let mut ticker = interval(Duration::from_secs(self.config.tick_interval_seconds));
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick_once().await {
                        Ok(moved) => {
                            consecutive_failures = 0;
                            if moved > 0 {
                                info!(moved, "Tick promoted jobs");
                            } else {
                                debug!("Tick found no due jobs");
                            }
                        }
                        Err(e) if e.is_store_unavailable() => {
                            let delay = self.backoff.next_delay(consecutive_failures);
                            consecutive_failures = consecutive_failures.saturating_add(1);
                            warn!(
                                error = %e,
                                consecutive_failures,
                                delay_ms = delay.as_millis() as u64,
                                "Store unavailable during tick, backing off"
                            );
                            tokio::select! {
                                _ = shutdown_rx.recv() => break,
                                _ = sleep(delay) => {}
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "Tick failed");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping tick driver");
                    break;
                }
            }
        }

        info!("Tick driver stopped");
        Ok(())
    }

    fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    async fn tick_once(&self) -> Result<u64, BoardError> {
        self.board.tick(None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_driver_config_default() {
        let config = TickDriverConfig::default();
        assert_eq!(config.tick_interval_seconds, 1);
    }

    #[tokio::test]
    async fn test_driver_stops_on_shutdown() {
        let board = Board::new("t", Arc::new(MemoryStore::new()));
        let driver = Arc::new(TickDriver::new(TickDriverConfig::default(), board));

        let running = {
            let driver = driver.clone();
            tokio::spawn(async move { driver.start().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        driver.stop();

        let result = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("driver did not stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_tick_once_on_empty_board() {
        let board = Board::new("t", Arc::new(MemoryStore::new()));
        let driver = TickDriver::new(TickDriverConfig::default(), board);
        assert_eq!(driver.tick_once().await.unwrap(), 0);
    }
}
