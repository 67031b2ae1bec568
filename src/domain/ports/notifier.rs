//! Fire-and-forget notification seam (supplement, grounded in
//! `original_source/backend/utils/feishu.py`). Never on the critical path:
//! callers must swallow failures rather than propagate them (spec §7).

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// One lifecycle event a `Notifier` may be asked to announce.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    TaskSubmitted { task_id: Uuid, task_name: String },
    TaskCompleted { task_id: Uuid, total_images: i64 },
    TaskPartialCompleted { task_id: Uuid, completed: i64, failed: i64 },
    TaskFailed { task_id: Uuid, reason: String },
    TaskCancelled { task_id: Uuid },
    SubtaskTerminal { task_id: Uuid, subtask_id: Uuid, status: String, error: Option<String> },
}

/// Port for announcing lifecycle events to an external channel. Adapters
/// must never let a delivery failure propagate to the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: TaskEvent);
}
