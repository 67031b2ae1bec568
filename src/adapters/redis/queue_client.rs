//! Redis-backed `QueueClient`: a ready list per logical queue plus a
//! `.DQ` delayed variant holding `(ready_at_ms, job)` pairs in a sorted set.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::domain::errors::{OrchestratorError, OrchestratorResult};
use crate::domain::ports::{QueueClient, QueueName, SubtaskJob};

#[derive(Clone)]
pub struct RedisQueueClient {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisQueueClient {
    pub async fn connect(redis_url: &str, key_prefix: impl Into<String>) -> OrchestratorResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| OrchestratorError::DbUnavailable(format!("invalid redis url: {e}")))?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| OrchestratorError::DbUnavailable(format!("redis connect failed: {e}")))?;
        Ok(Self {
            connection,
            key_prefix: key_prefix.into(),
        })
    }

    fn ready_key(&self, queue: QueueName) -> String {
        format!("{}:{}", self.key_prefix, queue.as_str())
    }

    fn delayed_key(&self, queue: QueueName) -> String {
        format!("{}:{}.DQ", self.key_prefix, queue.as_str())
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before epoch")
            .as_millis() as u64
    }

    /// Moves every due delayed job onto its ready list. Called before a
    /// worker pops, so a single client can run without a separate mover.
    pub async fn promote_due(&self, queue: QueueName) -> OrchestratorResult<u64> {
        let mut conn = self.connection.clone();
        let key = self.delayed_key(queue);
        let now = Self::now_ms() as f64;
        let due: Vec<String> = conn
            .zrangebyscore(&key, f64::NEG_INFINITY, now)
            .await
            .map_err(redis_err)?;
        if due.is_empty() {
            return Ok(0);
        }
        let ready_key = self.ready_key(queue);
        let mut pipe = redis::pipe();
        pipe.atomic();
        for job in &due {
            pipe.rpush(&ready_key, job).ignore();
            pipe.zrem(&key, job).ignore();
        }
        pipe.query_async::<()>(&mut conn).await.map_err(redis_err)?;
        Ok(due.len() as u64)
    }

    /// Blocking-pop the next ready job on `queue`, waiting up to
    /// `timeout_secs`. Returns `None` on timeout.
    pub async fn pop(&self, queue: QueueName, timeout_secs: f64) -> OrchestratorResult<Option<SubtaskJob>> {
        let mut conn = self.connection.clone();
        let key = self.ready_key(queue);
        let popped: Option<(String, String)> = conn.blpop(&key, timeout_secs).await.map_err(redis_err)?;
        popped
            .map(|(_, body)| {
                serde_json::from_str(&body)
                    .map_err(|e| OrchestratorError::SpecInvalid(format!("malformed queue body: {e}")))
            })
            .transpose()
    }
}

fn redis_err(err: redis::RedisError) -> OrchestratorError {
    OrchestratorError::DbUnavailable(format!("redis error: {err}"))
}

#[async_trait]
impl QueueClient for RedisQueueClient {
    async fn enqueue(&self, queue: QueueName, job: &SubtaskJob, delay_ms: Option<u64>) -> OrchestratorResult<()> {
        let mut conn = self.connection.clone();
        let body = serde_json::to_string(job)?;

        match delay_ms {
            None | Some(0) => {
                let key = self.ready_key(queue);
                let _: () = conn.rpush(&key, body).await.map_err(redis_err)?;
            }
            Some(delay) => {
                let key = self.delayed_key(queue);
                let ready_at = (Self::now_ms() + delay) as f64;
                let _: () = conn.zadd(&key, body, ready_at).await.map_err(redis_err)?;
            }
        }
        Ok(())
    }

    async fn scrub_containing(&self, queue: QueueName, subtask_ids: &[Uuid]) -> OrchestratorResult<u64> {
        if subtask_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let mut removed = 0u64;

        for key in [self.ready_key(queue), self.delayed_key(queue)] {
            let entries: Vec<String> = if key.ends_with(".DQ") {
                conn.zrange(&key, 0, -1).await.map_err(redis_err)?
            } else {
                conn.lrange(&key, 0, -1).await.map_err(redis_err)?
            };

            for entry in entries {
                let matches = serde_json::from_str::<SubtaskJob>(&entry)
                    .map(|job| subtask_ids.contains(&job.subtask_id))
                    .unwrap_or(false);
                if !matches {
                    continue;
                }
                let deleted: i64 = if key.ends_with(".DQ") {
                    conn.zrem(&key, &entry).await.map_err(redis_err)?
                } else {
                    conn.lrem(&key, 0, &entry).await.map_err(redis_err)?
                };
                removed += deleted as u64;
            }
        }
        Ok(removed)
    }
}
