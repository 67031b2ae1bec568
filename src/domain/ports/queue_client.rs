//! Queue client port (C1): enqueue/remove named jobs on a broker, with
//! optional per-message delay.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::OrchestratorResult;

/// Which logical queue a subtask is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Normal,
    Ops,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Ops => "ops",
        }
    }
}

/// Message body enqueued for one subtask. `actor_name` mirrors the broker
/// envelope the source system used (`{actor_name, args, kwargs, options}`);
/// we only ever need the subtask id, so `kwargs` carries exactly that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskJob {
    pub actor_name: String,
    pub subtask_id: Uuid,
    pub task_id: Uuid,
}

/// Port over the Redis-backed work queue. One production adapter
/// (`adapters::redis::RedisQueueClient`) maintains a normal list and a
/// `.DQ` delayed-list variant per logical queue.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Enqueue `job` onto `queue`. `delay_ms` of `0` (or `None`) goes onto
    /// the ready list; any positive delay routes to the delayed-queue
    /// variant per spec §4.4.
    async fn enqueue(
        &self,
        queue: QueueName,
        job: &SubtaskJob,
        delay_ms: Option<u64>,
    ) -> OrchestratorResult<()>;

    /// Remove every not-yet-consumed message (in both the ready and
    /// delayed-queue list-variants of `queue`) whose body references any of
    /// `subtask_ids`. Returns the count removed. Used by cancellation
    /// cleanup (C7) to satisfy P9.
    async fn scrub_containing(
        &self,
        queue: QueueName,
        subtask_ids: &[Uuid],
    ) -> OrchestratorResult<u64>;
}
