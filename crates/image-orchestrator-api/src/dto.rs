//! Wire DTOs for the HTTP surface: typed query-extractors and response
//! bodies, all wrapped by the uniform envelope in `crate::envelope`.

use chrono::{DateTime, Utc};
use image_orchestrator::domain::models::{Subtask, Task, TaskStatus};
use image_orchestrator::domain::ports::{Page, TaskFilter, TaskStats};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Default)]
pub struct TaskListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<String>,
    pub username: Option<String>,
    pub task_name: Option<String>,
    pub favorite: Option<bool>,
    pub deleted: Option<bool>,
    pub min_subtasks: Option<i64>,
    pub max_subtasks: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl TaskListQuery {
    pub fn page(&self) -> Page {
        Page {
            page: self.page.unwrap_or(1).max(1),
            page_size: self.page_size.unwrap_or(20).clamp(1, 500),
        }
    }

    pub fn filter(&self) -> TaskFilter {
        TaskFilter {
            status: self.status.as_deref().and_then(TaskStatus::parse_str),
            user_id: self.username.clone(),
            task_name: self.task_name.clone(),
            favorite: self.favorite,
            deleted: self.deleted,
            min_subtasks: self.min_subtasks,
            max_subtasks: self.max_subtasks,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IncludeSubtasksQuery {
    #[serde(default)]
    pub include_subtasks: bool,
}

/// `GET /task/{id}` response shape: the task itself, plus its subtasks
/// when the caller asked for `include_subtasks=true`.
#[derive(Debug, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Subtask>>,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Serialize)]
pub struct TaskStatsResponse {
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub processing: i64,
    pub pending: i64,
}

impl From<TaskStats> for TaskStatsResponse {
    fn from(stats: TaskStats) -> Self {
        Self {
            total: stats.total,
            completed: stats.completed,
            failed: stats.failed,
            cancelled: stats.cancelled,
            processing: stats.processing,
            pending: stats.pending,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: Uuid,
    pub queue: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub status: String,
    pub total_images: i64,
    pub processed_images: i64,
    pub progress: u8,
    pub completed_subtasks: i64,
    pub failed_subtasks: i64,
}

impl From<&Task> for ProgressResponse {
    fn from(task: &Task) -> Self {
        Self {
            status: task.status.as_str().to_string(),
            total_images: task.total_images,
            processed_images: task.processed_images,
            progress: task.progress,
            completed_subtasks: task.completed_subtasks,
            failed_subtasks: task.failed_subtasks,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub task_id: Uuid,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub task_id: Uuid,
    pub is_favorite: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub task_id: Uuid,
    pub is_deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: u8,
}

#[derive(Debug, Deserialize)]
pub struct EvaluationRequest {
    pub evaluation: String,
}

/// `POST /api/v1/auth/token` form body. The real JWT/user/role layer is
/// out of scope (spec §1); this only exists so the endpoint table has a
/// concrete stand-in to issue the one configured operator token against.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}
