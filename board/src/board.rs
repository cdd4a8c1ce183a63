// Board: job lifecycle and the periodic tick that promotes due jobs
// into per-runner delivery queues.

use crate::codec::{decode, Format};
use crate::errors::BoardError;
use crate::keys::BoardKeys;
use crate::models::{DecodedJob, JobRecord};
use crate::queue::{JobHandler, ListenConfig, Queue};
use crate::schedule::ScheduleDescriptor;
use crate::telemetry;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use crate::store::AtomicStore;

/// A named job scheduling board.
///
/// Owns job records, the schedule index, and the runner registry under its
/// keyspace. All mutations go through the injected store's atomic
/// operations; the board itself holds no mutable state, so handles are cheap
/// to clone and safe to share between producers, schedulers, and consumers.
#[derive(Clone)]
pub struct Board {
    name: String,
    keys: BoardKeys,
    store: Arc<dyn AtomicStore>,
}

impl Board {
    pub fn new(name: impl Into<String>, store: Arc<dyn AtomicStore>) -> Self {
        let name = name.into();
        let keys = BoardKeys::new(&name);
        Self { name, keys, store }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> &BoardKeys {
        &self.keys
    }

    fn build_record(
        &self,
        id: &str,
        runner: &str,
        payload: &str,
        schedule: &ScheduleDescriptor,
        now: i64,
    ) -> Result<JobRecord, BoardError> {
        let spec = schedule.normalize(now)?;
        Ok(JobRecord {
            id: id.to_string(),
            runner: runner.to_string(),
            payload: payload.to_string(),
            created_at: now,
            start: spec.start,
            stop: spec.stop,
            interval: spec.interval,
            step: spec.step,
            lambda: spec.lambda,
        })
    }

    /// Store a new job. Fails with `AlreadyExists` when the id is present;
    /// the check and the insert are one atomic operation.
    #[instrument(skip(self, payload, schedule), fields(board = %self.name, id, runner))]
    pub async fn create(
        &self,
        id: &str,
        runner: &str,
        payload: &str,
        schedule: &ScheduleDescriptor,
    ) -> Result<(), BoardError> {
        let record = self.build_record(id, runner, payload, schedule, Utc::now().timestamp())?;
        let inserted = self
            .store
            .set_if_absent(&self.keys, &record, record.start)
            .await?;
        if !inserted {
            return Err(BoardError::AlreadyExists(id.to_string()));
        }
        info!(due_at = record.start, "Job created");
        Ok(())
    }

    /// Store a job, unconditionally overwriting any existing job with the
    /// same id. The old schedule index entry is replaced (old due time
    /// discarded).
    #[instrument(skip(self, payload, schedule), fields(board = %self.name, id, runner))]
    pub async fn put(
        &self,
        id: &str,
        runner: &str,
        payload: &str,
        schedule: &ScheduleDescriptor,
    ) -> Result<(), BoardError> {
        let record = self.build_record(id, runner, payload, schedule, Utc::now().timestamp())?;
        self.store.set(&self.keys, &record, record.start).await?;
        info!(due_at = record.start, "Job stored");
        Ok(())
    }

    /// Fetch one job with its payload decoded via the format's codec.
    #[instrument(skip(self), fields(board = %self.name))]
    pub async fn show(&self, id: &str, format: Format) -> Result<DecodedJob, BoardError> {
        let record = self
            .store
            .get(&self.keys, id)
            .await?
            .ok_or_else(|| BoardError::NotFound(id.to_string()))?;
        let payload = decode(format, &record.payload)?;
        Ok(DecodedJob {
            id: record.id,
            runner: record.runner,
            payload,
            created_at: record.created_at,
            start: record.start,
            stop: record.stop,
            interval: record.interval,
        })
    }

    /// Full snapshot of all raw job records, for inspection and debugging.
    /// No ordering guarantee.
    #[instrument(skip(self), fields(board = %self.name))]
    pub async fn dump(&self) -> Result<HashMap<String, JobRecord>, BoardError> {
        self.store.dump_records(&self.keys).await
    }

    /// Delete a job record and its schedule index entry atomically.
    /// Removing an absent id is a no-op, not an error.
    #[instrument(skip(self), fields(board = %self.name))]
    pub async fn remove(&self, id: &str) -> Result<(), BoardError> {
        let existed = self.store.delete(&self.keys, id).await?;
        debug!(existed, "Job removed");
        Ok(())
    }

    /// Extension point: explicit runner-command registration. Runners are
    /// currently registered implicitly by create/put.
    pub async fn register(&self, _runner: &str, _command: &str) -> Result<(), BoardError> {
        Err(BoardError::Unsupported(
            "explicit runner registration is not supported".to_string(),
        ))
    }

    /// Extension point: recurrence registration semantics.
    pub async fn schedule(&self) -> Result<(), BoardError> {
        Err(BoardError::Unsupported(
            "schedule registration is not supported".to_string(),
        ))
    }

    /// A handle to the named runner's delivery queue, bound to this board's
    /// keyspace. Creates no persistent state by itself.
    pub fn get_queue(&self, name: &str) -> Queue {
        Queue::new(name, &self.keys, self.store.clone())
    }

    /// Promote every due schedule index entry into its runner's queue.
    ///
    /// The scan-and-move executes as one indivisible store operation, so
    /// concurrent or duplicate ticks covering overlapping time ranges never
    /// both promote the same due occurrence. Returns the number of entries
    /// pushed.
    #[instrument(skip(self), fields(board = %self.name))]
    pub async fn tick(&self, now: Option<i64>) -> Result<u64, BoardError> {
        let now = now.unwrap_or_else(|| Utc::now().timestamp());

        let runners = self.store.dump_runners(&self.keys).await?;
        let queues: Vec<(String, String)> = runners
            .keys()
            .map(|runner| (runner.clone(), self.keys.queue_key(runner)))
            .collect();

        let moved = self.store.scan_and_promote(&self.keys, &queues, now).await?;
        if moved > 0 {
            info!(moved, now, "Promoted due jobs");
        } else {
            debug!(now, "No jobs due");
        }
        telemetry::record_jobs_promoted(&self.name, moved);
        Ok(moved)
    }

    /// Convenience: listen on the named runner's queue with the given
    /// handler. Equivalent to `get_queue(name).listen(..)`.
    pub async fn respond(
        &self,
        queue_name: &str,
        config: ListenConfig,
        handler: JobHandler,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), BoardError> {
        self.get_queue(queue_name)
            .listen(config, handler, shutdown)
            .await
    }
}
