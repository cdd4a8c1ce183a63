// In-memory AtomicStore
//
// Single-process reference implementation: one async mutex over the whole
// state makes every operation trivially indivisible. Used by the unit and
// property tests; mirrors the Redis Lua promotion semantics exactly.

use crate::errors::BoardError;
use crate::keys::BoardKeys;
use crate::models::{JobRecord, QueueEntry};
use crate::store::AtomicStore;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout, Instant};

#[derive(Default)]
struct BoardState {
    /// Job records keyed by id.
    records: HashMap<String, JobRecord>,
    /// Schedule index: id -> due_at. Scanned in (due_at, id) order.
    schedule: HashMap<String, i64>,
    /// Runner registry: runner -> handler identifier.
    runners: HashMap<String, String>,
}

#[derive(Default)]
struct Inner {
    /// Per-board state keyed by the board hash key.
    boards: HashMap<String, BoardState>,
    /// FIFO queues keyed by the full queue key.
    queues: HashMap<String, VecDeque<QueueEntry>>,
}

/// In-memory store for tests and single-process use.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// Woken whenever any queue gains an entry.
    pushed: Notify,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn try_pop(&self, queue_key: &str) -> Option<QueueEntry> {
        let mut inner = self.inner.lock().await;
        inner.queues.get_mut(queue_key)?.pop_front()
    }
}

#[async_trait]
impl AtomicStore for MemoryStore {
    async fn set_if_absent(
        &self,
        keys: &BoardKeys,
        record: &JobRecord,
        due_at: i64,
    ) -> Result<bool, BoardError> {
        let mut inner = self.inner.lock().await;
        let state = inner.boards.entry(keys.board.clone()).or_default();
        if state.records.contains_key(&record.id) {
            return Ok(false);
        }
        state.records.insert(record.id.clone(), record.clone());
        state.schedule.insert(record.id.clone(), due_at);
        state
            .runners
            .insert(record.runner.clone(), record.runner.clone());
        Ok(true)
    }

    async fn set(
        &self,
        keys: &BoardKeys,
        record: &JobRecord,
        due_at: i64,
    ) -> Result<(), BoardError> {
        let mut inner = self.inner.lock().await;
        let state = inner.boards.entry(keys.board.clone()).or_default();
        state.records.insert(record.id.clone(), record.clone());
        state.schedule.insert(record.id.clone(), due_at);
        state
            .runners
            .insert(record.runner.clone(), record.runner.clone());
        Ok(())
    }

    async fn get(&self, keys: &BoardKeys, id: &str) -> Result<Option<JobRecord>, BoardError> {
        let mut inner = self.inner.lock().await;
        let state = inner.boards.entry(keys.board.clone()).or_default();
        Ok(state.records.get(id).cloned())
    }

    async fn scan_and_promote(
        &self,
        keys: &BoardKeys,
        queues: &[(String, String)],
        now: i64,
    ) -> Result<u64, BoardError> {
        let queue_by_runner: HashMap<&str, &str> = queues
            .iter()
            .map(|(runner, key)| (runner.as_str(), key.as_str()))
            .collect();

        let mut inner = self.inner.lock().await;
        let mut pushes: Vec<(String, QueueEntry)> = Vec::new();
        let mut moved = 0u64;

        {
            let state = inner.boards.entry(keys.board.clone()).or_default();

            // Ascending (due_at, id), matching sorted-set scan order.
            let mut due: Vec<(i64, String)> = state
                .schedule
                .iter()
                .filter(|(_, due_at)| **due_at <= now)
                .map(|(id, due_at)| (*due_at, id.clone()))
                .collect();
            due.sort();

            for (due_at, id) in due {
                let Some(record) = state.records.get(&id).cloned() else {
                    // Orphan entry: the record is gone.
                    state.schedule.remove(&id);
                    continue;
                };

                if let Some(stop) = record.stop {
                    if now > stop {
                        // Window expired. Non-recurring expiry also removes
                        // the record itself.
                        state.schedule.remove(&id);
                        if !record.is_recurring() {
                            state.records.remove(&id);
                        }
                        continue;
                    }
                }

                // Runners without a registered queue keep their entry until
                // the runner exists.
                let Some(queue_key) = queue_by_runner.get(record.runner.as_str()) else {
                    continue;
                };

                let entry = QueueEntry {
                    runner: record.runner.clone(),
                    job_id: id.clone(),
                    payload: record.payload.clone(),
                };

                if let Some(interval) = record.interval {
                    // One promotion per boundary crossed, strictly advancing
                    // the due time.
                    let mut fire = due_at;
                    while fire <= now && record.stop.map_or(true, |stop| fire <= stop) {
                        pushes.push((queue_key.to_string(), entry.clone()));
                        moved += 1;
                        fire += interval;
                    }
                    if record.stop.map_or(true, |stop| fire <= stop) {
                        state.schedule.insert(id, fire);
                    } else {
                        state.schedule.remove(&id);
                    }
                } else {
                    pushes.push((queue_key.to_string(), entry));
                    moved += 1;
                    match record.stop {
                        // Parked past the window so a later tick can expire
                        // the record; never re-promoted.
                        Some(stop) => {
                            state.schedule.insert(id, stop + 1);
                        }
                        None => {
                            state.schedule.remove(&id);
                        }
                    }
                }
            }
        }

        for (queue_key, entry) in pushes {
            inner.queues.entry(queue_key).or_default().push_back(entry);
        }
        drop(inner);

        if moved > 0 {
            self.pushed.notify_waiters();
        }
        Ok(moved)
    }

    async fn blocking_pop(
        &self,
        queue_key: &str,
        wait: Duration,
    ) -> Result<Option<QueueEntry>, BoardError> {
        let deadline = Instant::now() + wait;
        loop {
            // Register for wakeups before re-checking, so a push between the
            // check and the wait is not missed.
            let mut notified = std::pin::pin!(self.pushed.notified());
            notified.as_mut().enable();

            if let Some(entry) = self.try_pop(queue_key).await {
                return Ok(Some(entry));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            if timeout(remaining, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn delete(&self, keys: &BoardKeys, id: &str) -> Result<bool, BoardError> {
        let mut inner = self.inner.lock().await;
        let state = inner.boards.entry(keys.board.clone()).or_default();
        state.schedule.remove(id);
        Ok(state.records.remove(id).is_some())
    }

    async fn dump_records(
        &self,
        keys: &BoardKeys,
    ) -> Result<HashMap<String, JobRecord>, BoardError> {
        let mut inner = self.inner.lock().await;
        let state = inner.boards.entry(keys.board.clone()).or_default();
        Ok(state.records.clone())
    }

    async fn dump_runners(
        &self,
        keys: &BoardKeys,
    ) -> Result<HashMap<String, String>, BoardError> {
        let mut inner = self.inner.lock().await;
        let state = inner.boards.entry(keys.board.clone()).or_default();
        Ok(state.runners.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, due: i64) -> JobRecord {
        JobRecord {
            id: id.to_string(),
            runner: "mailer".to_string(),
            payload: "p".to_string(),
            created_at: due,
            start: due,
            stop: None,
            interval: None,
            step: None,
            lambda: None,
        }
    }

    #[tokio::test]
    async fn test_set_if_absent_rejects_duplicates() {
        let store = MemoryStore::new();
        let keys = BoardKeys::new("t");
        assert!(store.set_if_absent(&keys, &record("j1", 10), 10).await.unwrap());
        assert!(!store.set_if_absent(&keys, &record("j1", 20), 20).await.unwrap());
    }

    #[tokio::test]
    async fn test_promotion_is_fifo_by_due_time() {
        let store = MemoryStore::new();
        let keys = BoardKeys::new("t");
        store.set(&keys, &record("late", 20), 20).await.unwrap();
        store.set(&keys, &record("early", 10), 10).await.unwrap();

        let queues = vec![("mailer".to_string(), keys.queue_key("mailer"))];
        let moved = store.scan_and_promote(&keys, &queues, 30).await.unwrap();
        assert_eq!(moved, 2);

        let first = store
            .blocking_pop(&keys.queue_key("mailer"), Duration::from_millis(50))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.job_id, "early");
    }

    #[tokio::test]
    async fn test_blocking_pop_times_out_on_empty_queue() {
        let store = MemoryStore::new();
        let start = Instant::now();
        let popped = store
            .blocking_pop("t:queue:mailer", Duration::from_millis(50))
            .await
            .unwrap();
        assert!(popped.is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_blocking_pop_wakes_on_promotion() {
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let keys = BoardKeys::new("t");
        store.set(&keys, &record("j1", 5), 5).await.unwrap();

        let popper = {
            let store = store.clone();
            let queue_key = keys.queue_key("mailer");
            tokio::spawn(async move {
                store
                    .blocking_pop(&queue_key, Duration::from_secs(5))
                    .await
                    .unwrap()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let queues = vec![("mailer".to_string(), keys.queue_key("mailer"))];
        store.scan_and_promote(&keys, &queues, 10).await.unwrap();

        let popped = popper.await.unwrap();
        assert_eq!(popped.unwrap().job_id, "j1");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        let keys = BoardKeys::new("t");
        store.set(&keys, &record("j1", 10), 10).await.unwrap();
        assert!(store.delete(&keys, "j1").await.unwrap());
        assert!(!store.delete(&keys, "j1").await.unwrap());
    }
}
