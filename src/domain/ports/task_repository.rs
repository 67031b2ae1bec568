//! Task repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::OrchestratorResult;
use crate::domain::models::{Task, TaskStatus};

/// Filter criteria for `GET /api/v1/test/tasks` and the `/stats` variant.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub user_id: Option<String>,
    pub task_name: Option<String>,
    pub favorite: Option<bool>,
    pub deleted: Option<bool>,
    pub min_subtasks: Option<i64>,
    pub max_subtasks: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size.max(1))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskStats {
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub processing: i64,
    pub pending: i64,
}

/// Repository interface for `Task` persistence.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> OrchestratorResult<()>;
    async fn get(&self, id: Uuid) -> OrchestratorResult<Option<Task>>;
    async fn update(&self, task: &Task) -> OrchestratorResult<()>;

    async fn list(&self, filter: &TaskFilter, page: Page) -> OrchestratorResult<(Vec<Task>, i64)>;
    async fn stats(&self, filter: &TaskFilter) -> OrchestratorResult<TaskStats>;

    /// Tasks currently in `processing`, used by the admission controller's
    /// recent-running-task and Lumina-exclusivity checks.
    async fn list_processing(&self) -> OrchestratorResult<Vec<Task>>;

    /// Every task still in `processing`, used to respawn monitor loops on
    /// restart (Design Notes: "no hidden global singletons").
    async fn list_by_status(&self, status: TaskStatus) -> OrchestratorResult<Vec<Task>>;
}
