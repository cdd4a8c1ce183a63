// AtomicStore: the indivisible multi-key operations the board's correctness
// rests on. Every operation here is atomic with respect to all concurrent
// callers, local or remote.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::errors::BoardError;
use crate::keys::BoardKeys;
use crate::models::{JobRecord, QueueEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Indivisible multi-key operations against shared board state.
///
/// Invariants every implementation must uphold:
/// - `set_if_absent` checks and inserts as one unit (no lost-update window);
/// - `scan_and_promote` executes as one unit per invocation, so two
///   concurrent or duplicate calls covering overlapping time ranges never
///   both promote the same due occurrence;
/// - `blocking_pop` removes and returns the oldest entry atomically and
///   never blocks past its timeout;
/// - `delete` removes the record and its index entry together.
#[async_trait]
pub trait AtomicStore: Send + Sync {
    /// Write the record, its schedule index entry, and the runner
    /// registration iff the id is absent. Returns false when it exists.
    async fn set_if_absent(
        &self,
        keys: &BoardKeys,
        record: &JobRecord,
        due_at: i64,
    ) -> Result<bool, BoardError>;

    /// Unconditional overwrite; any previous index entry for the id is
    /// replaced (old due time discarded).
    async fn set(&self, keys: &BoardKeys, record: &JobRecord, due_at: i64)
        -> Result<(), BoardError>;

    /// Fetch one raw job record.
    async fn get(&self, keys: &BoardKeys, id: &str) -> Result<Option<JobRecord>, BoardError>;

    /// The tick primitive: move every index entry due at or before `now`
    /// into its runner's queue, advancing or retiring the entry per the
    /// promotion semantics. `queues` pairs each registered runner with its
    /// queue key. Returns the number of entries pushed.
    async fn scan_and_promote(
        &self,
        keys: &BoardKeys,
        queues: &[(String, String)],
        now: i64,
    ) -> Result<u64, BoardError>;

    /// Remove and return the oldest entry of one queue, waiting up to
    /// `timeout` for one to appear. `None` means empty, never an error.
    async fn blocking_pop(
        &self,
        queue_key: &str,
        timeout: Duration,
    ) -> Result<Option<QueueEntry>, BoardError>;

    /// Remove the record and its index entry. Returns whether a record
    /// existed.
    async fn delete(&self, keys: &BoardKeys, id: &str) -> Result<bool, BoardError>;

    /// Full snapshot of all job records. No ordering guarantee.
    async fn dump_records(
        &self,
        keys: &BoardKeys,
    ) -> Result<HashMap<String, JobRecord>, BoardError>;

    /// Runner registry snapshot: runner name -> handler identifier.
    async fn dump_runners(&self, keys: &BoardKeys)
        -> Result<HashMap<String, String>, BoardError>;
}
