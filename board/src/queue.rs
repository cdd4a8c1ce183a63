// Per-runner delivery queue: bounded blocking pop and the consumption loop

use crate::codec::{decode, Format};
use crate::errors::BoardError;
use crate::keys::BoardKeys;
use crate::models::DeliveredJob;
use crate::retry::{ExponentialBackoff, RetryStrategy};
use crate::store::AtomicStore;
use crate::telemetry;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Default bounded wait for one pop cycle.
pub const DEFAULT_POP_TIMEOUT: Duration = Duration::from_secs(1);

/// Callback invoked once per popped entry.
pub type JobHandler =
    Arc<dyn Fn(DeliveredJob) -> BoxFuture<'static, Result<(), anyhow::Error>> + Send + Sync>;

/// Explicit listen configuration, validated before the loop starts.
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Codec applied to every popped payload.
    pub format: Format,
    /// Bounded wait per pop cycle; the shutdown signal is checked between
    /// cycles, so this also bounds shutdown latency.
    pub poll_timeout: Duration,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            format: Format::Plain,
            poll_timeout: DEFAULT_POP_TIMEOUT,
        }
    }
}

impl ListenConfig {
    fn validate(&self) -> Result<(), BoardError> {
        if self.poll_timeout.is_zero() {
            return Err(BoardError::InvalidArgument(
                "listen poll_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// A named, per-runner FIFO of ready-to-run job references.
///
/// Entries are produced only by tick and consumed only by pop; once popped
/// an entry is gone (at-least-once delivery ends at the queue boundary,
/// consumer idempotence is the consumer's concern).
#[derive(Clone)]
pub struct Queue {
    name: String,
    key: String,
    store: Arc<dyn AtomicStore>,
}

impl Queue {
    pub(crate) fn new(name: &str, keys: &BoardKeys, store: Arc<dyn AtomicStore>) -> Self {
        Self {
            name: name.to_string(),
            key: keys.queue_key(name),
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Pop the oldest entry, waiting up to the default budget of one second.
    /// `None` means the queue stayed empty, never an error.
    pub async fn pop(&self, format: Format) -> Result<Option<DeliveredJob>, BoardError> {
        self.pop_within(format, DEFAULT_POP_TIMEOUT).await
    }

    /// Pop the oldest entry with an explicit wait budget.
    #[instrument(skip(self), fields(queue = %self.key))]
    pub async fn pop_within(
        &self,
        format: Format,
        wait: Duration,
    ) -> Result<Option<DeliveredJob>, BoardError> {
        if wait.is_zero() {
            // A zero wait would mean "block forever" to the store (BLPOP 0).
            return Err(BoardError::InvalidArgument(
                "pop wait must be non-zero".to_string(),
            ));
        }
        let Some(entry) = self.store.blocking_pop(&self.key, wait).await? else {
            return Ok(None);
        };
        let payload = decode(format, &entry.payload)?;
        telemetry::record_job_delivered(&self.name);
        Ok(Some(DeliveredJob {
            job_id: entry.job_id,
            runner: entry.runner,
            payload,
        }))
    }

    /// Run the consumption loop: pop with a bounded wait, invoke the handler
    /// once per entry in FIFO order, repeat until the shutdown signal fires.
    ///
    /// A handler failure is logged and counted without breaking the loop.
    /// Store failures back off exponentially and reset on the next success,
    /// so an empty queue and a broken store are never treated alike.
    #[instrument(skip(self, handler, shutdown), fields(queue = %self.key))]
    pub async fn listen(
        &self,
        config: ListenConfig,
        handler: JobHandler,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), BoardError> {
        config.validate()?;

        info!(format = %config.format, "Listening for jobs");
        let backoff = ExponentialBackoff::default();
        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutdown signal received, leaving listen loop");
                    return Ok(());
                }
                popped = self.pop_within(config.format, config.poll_timeout) => {
                    match popped {
                        Ok(Some(job)) => {
                            consecutive_failures = 0;
                            let job_id = job.job_id.clone();
                            debug!(job_id = %job_id, "Dispatching job to handler");
                            if let Err(e) = handler(job).await {
                                telemetry::record_handler_failure(&self.name);
                                error!(job_id = %job_id, error = %e, "Job handler failed");
                            }
                        }
                        Ok(None) => {
                            // Empty queue: nothing to do, poll again.
                            consecutive_failures = 0;
                        }
                        Err(e) if e.is_store_unavailable() => {
                            telemetry::record_store_error(&self.name);
                            let delay = backoff.next_delay(consecutive_failures);
                            consecutive_failures = consecutive_failures.saturating_add(1);
                            warn!(
                                error = %e,
                                consecutive_failures,
                                delay_ms = delay.as_millis() as u64,
                                "Store unavailable, backing off"
                            );
                            tokio::select! {
                                _ = shutdown.recv() => {
                                    info!("Shutdown signal received during backoff");
                                    return Ok(());
                                }
                                _ = sleep(delay) => {}
                            }
                        }
                        Err(e) => {
                            // Malformed entry data: drop it and keep going.
                            telemetry::record_handler_failure(&self.name);
                            error!(error = %e, "Failed to decode queue entry");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_config_rejects_zero_timeout() {
        let config = ListenConfig {
            format: Format::Plain,
            poll_timeout: Duration::ZERO,
        };
        assert!(matches!(
            config.validate(),
            Err(BoardError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_listen_config_default_is_valid() {
        assert!(ListenConfig::default().validate().is_ok());
        assert_eq!(ListenConfig::default().poll_timeout, DEFAULT_POP_TIMEOUT);
    }
}
