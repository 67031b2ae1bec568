//! SQLite implementation of `SubtaskRepository`.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{subtask_not_found, OrchestratorError, OrchestratorResult};
use crate::domain::models::{Subtask, SubtaskParams, SubtaskStatus};
use crate::domain::ports::SubtaskRepository;

#[derive(Clone)]
pub struct SqliteSubtaskRepository {
    pool: SqlitePool,
}

impl SqliteSubtaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SubtaskRow {
    id: String,
    task_id: String,
    variable_indices: String,
    prompts: String,
    params: String,
    status: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    error: Option<String>,
    result: Option<String>,
    timeout_retry_count: i64,
    error_retry_count: i64,
    rating: i64,
    evaluation: String,
    created_at: String,
}

impl TryFrom<SubtaskRow> for Subtask {
    type Error = OrchestratorError;

    fn try_from(row: SubtaskRow) -> Result<Self, Self::Error> {
        Ok(Subtask {
            id: parse_uuid(&row.id)?,
            task_id: parse_uuid(&row.task_id)?,
            variable_indices: serde_json::from_str(&row.variable_indices)?,
            prompts: serde_json::from_str(&row.prompts)?,
            params: serde_json::from_str::<SubtaskParams>(&row.params)?,
            status: SubtaskStatus::parse_str(&row.status).ok_or_else(|| {
                OrchestratorError::SpecInvalid(format!("unknown subtask status {}", row.status))
            })?,
            started_at: parse_optional_datetime(row.started_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
            error: row.error,
            result: row.result,
            timeout_retry_count: row.timeout_retry_count as i32,
            error_retry_count: row.error_retry_count as i32,
            rating: row.rating as u8,
            evaluation: serde_json::from_str(&row.evaluation)?,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[async_trait]
impl SubtaskRepository for SqliteSubtaskRepository {
    async fn create_many(&self, subtasks: &[Subtask]) -> OrchestratorResult<()> {
        let mut tx = self.pool.begin().await?;
        for subtask in subtasks {
            sqlx::query(
                r#"INSERT INTO subtasks (id, task_id, variable_indices, prompts, params, status,
                   started_at, completed_at, error, result, timeout_retry_count, error_retry_count,
                   rating, evaluation, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(subtask.id.to_string())
            .bind(subtask.task_id.to_string())
            .bind(serde_json::to_string(&subtask.variable_indices)?)
            .bind(serde_json::to_string(&subtask.prompts)?)
            .bind(serde_json::to_string(&subtask.params)?)
            .bind(subtask.status.as_str())
            .bind(subtask.started_at.map(|t| t.to_rfc3339()))
            .bind(subtask.completed_at.map(|t| t.to_rfc3339()))
            .bind(&subtask.error)
            .bind(&subtask.result)
            .bind(i64::from(subtask.timeout_retry_count))
            .bind(i64::from(subtask.error_retry_count))
            .bind(i64::from(subtask.rating))
            .bind(serde_json::to_string(&subtask.evaluation)?)
            .bind(subtask.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> OrchestratorResult<Option<Subtask>> {
        let row: Option<SubtaskRow> = sqlx::query_as("SELECT * FROM subtasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Subtask::try_from).transpose()
    }

    async fn update(&self, subtask: &Subtask) -> OrchestratorResult<()> {
        let result = sqlx::query(
            r#"UPDATE subtasks SET status = ?, started_at = ?, completed_at = ?, error = ?,
               result = ?, timeout_retry_count = ?, error_retry_count = ?, rating = ?, evaluation = ?
               WHERE id = ?"#,
        )
        .bind(subtask.status.as_str())
        .bind(subtask.started_at.map(|t| t.to_rfc3339()))
        .bind(subtask.completed_at.map(|t| t.to_rfc3339()))
        .bind(&subtask.error)
        .bind(&subtask.result)
        .bind(i64::from(subtask.timeout_retry_count))
        .bind(i64::from(subtask.error_retry_count))
        .bind(i64::from(subtask.rating))
        .bind(serde_json::to_string(&subtask.evaluation)?)
        .bind(subtask.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(subtask_not_found(subtask.id));
        }
        Ok(())
    }

    async fn list_by_task(&self, task_id: Uuid) -> OrchestratorResult<Vec<Subtask>> {
        let rows: Vec<SubtaskRow> =
            sqlx::query_as("SELECT * FROM subtasks WHERE task_id = ? ORDER BY created_at ASC")
                .bind(task_id.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Subtask::try_from).collect()
    }

    async fn claim(&self, id: Uuid) -> OrchestratorResult<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE subtasks SET status = 'processing', started_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn cancel_pending(&self, task_id: Uuid) -> OrchestratorResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM subtasks WHERE task_id = ? AND status = 'pending'")
                .bind(task_id.to_string())
                .fetch_all(&mut *tx)
                .await?;

        if ids.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        sqlx::query(
            "UPDATE subtasks SET status = 'cancelled', error = 'parent task cancelled', completed_at = ?
             WHERE task_id = ? AND status = 'pending'",
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(task_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        ids.into_iter().map(|(id,)| parse_uuid(&id)).collect()
    }
}
