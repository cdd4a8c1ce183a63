// Redis-backed AtomicStore
//
// Multi-key writes and the scan-and-promote pass run as Lua scripts, which
// Redis executes atomically server-side. Plain reads use HGET/HGETALL;
// blocking pops use BLPOP on a dedicated connection.

use crate::config::RedisConfig;
use crate::errors::BoardError;
use crate::keys::BoardKeys;
use crate::models::{JobRecord, QueueEntry};
use crate::store::AtomicStore;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Unconditional write: record, index entry (replacing any previous due
/// time), and runner registration.
const SET_SCRIPT: &str = r#"
    redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
    redis.call('ZADD', KEYS[2], ARGV[4], ARGV[1])
    redis.call('HSET', KEYS[3], ARGV[2], ARGV[2])
    return 1
"#;

/// Insert-if-absent variant: the HSETNX result decides whether the index
/// entry and registration are written at all.
const SET_IF_ABSENT_SCRIPT: &str = r#"
    if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[3]) == 0 then
        return 0
    end
    redis.call('ZADD', KEYS[2], ARGV[4], ARGV[1])
    redis.call('HSET', KEYS[3], ARGV[2], ARGV[2])
    return 1
"#;

/// Remove the record and its index entry together.
const DELETE_SCRIPT: &str = r#"
    local removed = redis.call('HDEL', KEYS[1], ARGV[1])
    redis.call('ZREM', KEYS[2], ARGV[1])
    return removed
"#;

/// The tick pass. KEYS: board hash, schedule zset, then one queue key per
/// registered runner. ARGV: now, then the runner names aligned with the
/// queue keys.
///
/// For each index entry due at or before now, ascending by due time:
/// - missing record: drop the orphan entry;
/// - past its stop: drop the entry, and delete the record when the job is
///   non-recurring (window expiry);
/// - recurring: push one queue entry per interval boundary crossed, bounded
///   by stop, then re-insert at the next future boundary (or retire the
///   entry when that boundary falls past stop);
/// - one-shot: push one entry, then park the entry at stop+1 when a window
///   exists (so a later tick can expire the record) or drop it outright.
/// Entries whose runner has no registered queue are left untouched.
///
/// Optional record fields are omitted at encode time, never null: cjson
/// decodes a JSON null to a truthy sentinel, not nil.
const TICK_SCRIPT: &str = r#"
    local board = KEYS[1]
    local schedule = KEYS[2]
    local now = tonumber(ARGV[1])

    local queues = {}
    for i = 2, #ARGV do
        queues[ARGV[i]] = KEYS[i + 1]
    end

    local moved = 0
    local due = redis.call('ZRANGEBYSCORE', schedule, '-inf', now, 'WITHSCORES')

    for i = 1, #due, 2 do
        local id = due[i]
        local due_at = tonumber(due[i + 1])
        local raw = redis.call('HGET', board, id)

        if not raw then
            redis.call('ZREM', schedule, id)
        else
            local rec = cjson.decode(raw)
            local stop = rec.stop
            local interval = rec.interval

            if stop and now > stop then
                redis.call('ZREM', schedule, id)
                if not interval then
                    redis.call('HDEL', board, id)
                end
            else
                local queue = queues[rec.runner]
                if queue then
                    local entry = cjson.encode({
                        runner = rec.runner, job_id = id, payload = rec.payload,
                    })
                    if interval then
                        local fire = due_at
                        while fire <= now and (not stop or fire <= stop) do
                            redis.call('RPUSH', queue, entry)
                            moved = moved + 1
                            fire = fire + interval
                        end
                        if stop and fire > stop then
                            redis.call('ZREM', schedule, id)
                        else
                            redis.call('ZADD', schedule, fire, id)
                        end
                    else
                        redis.call('RPUSH', queue, entry)
                        moved = moved + 1
                        if stop then
                            redis.call('ZADD', schedule, stop + 1, id)
                        else
                            redis.call('ZREM', schedule, id)
                        end
                    end
                end
            end
        end
    end

    return moved
"#;

/// Redis-backed store. Plain commands share one multiplexed connection;
/// blocking pops open their own so a BLPOP cannot stall concurrent callers.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    manager: ConnectionManager,
    set_script: Script,
    set_if_absent_script: Script,
    delete_script: Script,
    tick_script: Script,
}

impl RedisStore {
    #[instrument(skip(config), fields(redis_url = %config.url))]
    pub async fn new(config: &RedisConfig) -> Result<Self, BoardError> {
        info!("Connecting to Redis");

        let client = Client::open(config.url.as_str())
            .map_err(|e| BoardError::StoreUnavailable(format!("invalid Redis URL: {}", e)))?;

        let manager = ConnectionManager::new(client.clone()).await.map_err(|e| {
            BoardError::StoreUnavailable(format!("failed to connect to Redis: {}", e))
        })?;

        info!("Redis connection established");

        Ok(Self {
            client,
            manager,
            set_script: Script::new(SET_SCRIPT),
            set_if_absent_script: Script::new(SET_IF_ABSENT_SCRIPT),
            delete_script: Script::new(DELETE_SCRIPT),
            tick_script: Script::new(TICK_SCRIPT),
        })
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Verify the connection is alive.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), BoardError> {
        let mut conn = self.connection();
        let response: String = redis::cmd("PING").query_async(&mut conn).await?;
        if response != "PONG" {
            return Err(BoardError::StoreUnavailable(format!(
                "unexpected PING response: {}",
                response
            )));
        }
        Ok(())
    }

    async fn run_write_script(
        &self,
        script: &Script,
        keys: &BoardKeys,
        record: &JobRecord,
        due_at: i64,
    ) -> Result<i64, BoardError> {
        let encoded = serde_json::to_string(record)?;
        let mut conn = self.connection();
        let written: i64 = script
            .key(&keys.board)
            .key(&keys.schedule)
            .key(&keys.registry)
            .arg(&record.id)
            .arg(&record.runner)
            .arg(encoded)
            .arg(due_at)
            .invoke_async(&mut conn)
            .await?;
        Ok(written)
    }
}

#[async_trait]
impl AtomicStore for RedisStore {
    #[instrument(skip(self, record), fields(board = %keys.board, id = %record.id))]
    async fn set_if_absent(
        &self,
        keys: &BoardKeys,
        record: &JobRecord,
        due_at: i64,
    ) -> Result<bool, BoardError> {
        let written = self
            .run_write_script(&self.set_if_absent_script, keys, record, due_at)
            .await?;
        Ok(written == 1)
    }

    #[instrument(skip(self, record), fields(board = %keys.board, id = %record.id))]
    async fn set(
        &self,
        keys: &BoardKeys,
        record: &JobRecord,
        due_at: i64,
    ) -> Result<(), BoardError> {
        self.run_write_script(&self.set_script, keys, record, due_at)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(board = %keys.board))]
    async fn get(&self, keys: &BoardKeys, id: &str) -> Result<Option<JobRecord>, BoardError> {
        let mut conn = self.connection();
        let raw: Option<String> = conn.hget(&keys.board, id).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, queues), fields(board = %keys.board, runners = queues.len()))]
    async fn scan_and_promote(
        &self,
        keys: &BoardKeys,
        queues: &[(String, String)],
        now: i64,
    ) -> Result<u64, BoardError> {
        let mut conn = self.connection();
        let mut invocation = self.tick_script.prepare_invoke();
        invocation.key(&keys.board).key(&keys.schedule);
        for (_, queue_key) in queues {
            invocation.key(queue_key);
        }
        invocation.arg(now);
        for (runner, _) in queues {
            invocation.arg(runner);
        }
        let moved: u64 = invocation.invoke_async(&mut conn).await?;
        debug!(moved, now, "Promotion pass complete");
        Ok(moved)
    }

    #[instrument(skip(self))]
    async fn blocking_pop(
        &self,
        queue_key: &str,
        timeout: Duration,
    ) -> Result<Option<QueueEntry>, BoardError> {
        // BLPOP parks the connection until data or timeout, so it gets its
        // own connection instead of the shared multiplexed one.
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(BoardError::from)?;

        let reply: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(queue_key)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;

        match reply {
            Some((_, raw)) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(board = %keys.board))]
    async fn delete(&self, keys: &BoardKeys, id: &str) -> Result<bool, BoardError> {
        let mut conn = self.connection();
        let removed: i64 = self
            .delete_script
            .key(&keys.board)
            .key(&keys.schedule)
            .arg(id)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }

    #[instrument(skip(self), fields(board = %keys.board))]
    async fn dump_records(
        &self,
        keys: &BoardKeys,
    ) -> Result<HashMap<String, JobRecord>, BoardError> {
        let mut conn = self.connection();
        let raw: HashMap<String, String> = conn.hgetall(&keys.board).await?;
        let mut records = HashMap::with_capacity(raw.len());
        for (id, encoded) in raw {
            records.insert(id, serde_json::from_str(&encoded)?);
        }
        Ok(records)
    }

    #[instrument(skip(self), fields(board = %keys.board))]
    async fn dump_runners(
        &self,
        keys: &BoardKeys,
    ) -> Result<HashMap<String, String>, BoardError> {
        let mut conn = self.connection();
        Ok(conn.hgetall(&keys.registry).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_fails_fast() {
        let config = RedisConfig {
            url: "redis://invalid-host:9999".to_string(),
            pool_size: 10,
        };
        let result = RedisStore::new(&config).await;
        assert!(result.is_err());
    }
}
