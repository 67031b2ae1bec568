//! Subtask repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::OrchestratorResult;
use crate::domain::models::Subtask;

/// Repository interface for `Subtask` persistence.
#[async_trait]
pub trait SubtaskRepository: Send + Sync {
    async fn create_many(&self, subtasks: &[Subtask]) -> OrchestratorResult<()>;
    async fn get(&self, id: Uuid) -> OrchestratorResult<Option<Subtask>>;
    async fn update(&self, subtask: &Subtask) -> OrchestratorResult<()>;
    async fn list_by_task(&self, task_id: Uuid) -> OrchestratorResult<Vec<Subtask>>;

    /// Atomically transitions `id` from `pending` to `processing`, returning
    /// `false` (no-op) if it observed anything other than `pending` — the
    /// claim-by-conditional-update guard of spec §5 that prevents a
    /// redelivered message from double-executing a subtask.
    async fn claim(&self, id: Uuid) -> OrchestratorResult<bool>;

    /// Marks every subtask of `task_id` still in `pending` as `cancelled`
    /// with `error="parent task cancelled"`, in one transaction. Returns the
    /// ids that were actually transitioned (used to scrub the queue).
    async fn cancel_pending(&self, task_id: Uuid) -> OrchestratorResult<Vec<Uuid>>;
}
