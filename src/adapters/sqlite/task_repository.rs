//! SQLite implementation of `TaskRepository`.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{task_not_found, OrchestratorError, OrchestratorResult};
use crate::domain::models::{Task, TaskParameters, TaskStatus};
use crate::domain::ports::{Page, TaskFilter, TaskRepository, TaskStats};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    name: String,
    user_id: String,
    priority: i64,
    prompts: String,
    parameters: String,
    total_images: i64,
    variables: String,
    variables_map: String,
    status: String,
    processed_images: i64,
    progress: i64,
    completed_subtasks: i64,
    failed_subtasks: i64,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
    is_favorite: bool,
    is_deleted: bool,
}

impl TryFrom<TaskRow> for Task {
    type Error = OrchestratorError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: parse_uuid(&row.id)?,
            name: row.name,
            user_id: row.user_id,
            priority: row.priority as i32,
            prompts: serde_json::from_str(&row.prompts)?,
            parameters: serde_json::from_str(&row.parameters)?,
            total_images: row.total_images,
            variables: serde_json::from_str(&row.variables)?,
            variables_map: serde_json::from_str(&row.variables_map)?,
            status: TaskStatus::parse_str(&row.status)
                .ok_or_else(|| OrchestratorError::SpecInvalid(format!("unknown task status {}", row.status)))?,
            processed_images: row.processed_images,
            progress: row.progress as u8,
            completed_subtasks: row.completed_subtasks,
            failed_subtasks: row.failed_subtasks,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
            is_favorite: row.is_favorite,
            is_deleted: row.is_deleted,
        })
    }
}

fn serialize_parameters(parameters: &TaskParameters) -> OrchestratorResult<String> {
    Ok(serde_json::to_string(parameters)?)
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> OrchestratorResult<()> {
        sqlx::query(
            r#"INSERT INTO tasks (id, name, user_id, priority, prompts, parameters, total_images,
               variables, variables_map, status, processed_images, progress, completed_subtasks,
               failed_subtasks, created_at, updated_at, completed_at, is_favorite, is_deleted)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(&task.name)
        .bind(&task.user_id)
        .bind(task.priority)
        .bind(serde_json::to_string(&task.prompts)?)
        .bind(serialize_parameters(&task.parameters)?)
        .bind(task.total_images)
        .bind(serde_json::to_string(&task.variables)?)
        .bind(serde_json::to_string(&task.variables_map)?)
        .bind(task.status.as_str())
        .bind(task.processed_images)
        .bind(i64::from(task.progress))
        .bind(task.completed_subtasks)
        .bind(task.failed_subtasks)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .bind(task.is_favorite)
        .bind(task.is_deleted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> OrchestratorResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Task::try_from).transpose()
    }

    async fn update(&self, task: &Task) -> OrchestratorResult<()> {
        let result = sqlx::query(
            r#"UPDATE tasks SET name = ?, priority = ?, prompts = ?, parameters = ?, total_images = ?,
               variables = ?, variables_map = ?, status = ?, processed_images = ?, progress = ?,
               completed_subtasks = ?, failed_subtasks = ?, updated_at = ?, completed_at = ?,
               is_favorite = ?, is_deleted = ?
               WHERE id = ?"#,
        )
        .bind(&task.name)
        .bind(task.priority)
        .bind(serde_json::to_string(&task.prompts)?)
        .bind(serialize_parameters(&task.parameters)?)
        .bind(task.total_images)
        .bind(serde_json::to_string(&task.variables)?)
        .bind(serde_json::to_string(&task.variables_map)?)
        .bind(task.status.as_str())
        .bind(task.processed_images)
        .bind(i64::from(task.progress))
        .bind(task.completed_subtasks)
        .bind(task.failed_subtasks)
        .bind(task.updated_at.to_rfc3339())
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .bind(task.is_favorite)
        .bind(task.is_deleted)
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(task_not_found(task.id));
        }
        Ok(())
    }

    async fn list(&self, filter: &TaskFilter, page: Page) -> OrchestratorResult<(Vec<Task>, i64)> {
        let mut count_builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM tasks");
        push_filter(&mut count_builder, filter);
        let (total,): (i64,) = count_builder.build_query_as().fetch_one(&self.pool).await?;

        let mut list_builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM tasks");
        push_filter(&mut list_builder, filter);
        list_builder.push(" ORDER BY created_at DESC LIMIT ");
        list_builder.push_bind(i64::from(page.page_size.max(1)));
        list_builder.push(" OFFSET ");
        list_builder.push_bind(page.offset());

        let rows: Vec<TaskRow> = list_builder.build_query_as().fetch_all(&self.pool).await?;
        let tasks = rows.into_iter().map(Task::try_from).collect::<Result<_, _>>()?;
        Ok((tasks, total))
    }

    async fn stats(&self, filter: &TaskFilter) -> OrchestratorResult<TaskStats> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT
                COUNT(*) AS total,
                SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END) AS completed,
                SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END) AS failed,
                SUM(CASE WHEN status = 'cancelled' THEN 1 ELSE 0 END) AS cancelled,
                SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END) AS processing,
                SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END) AS pending
             FROM tasks",
        );
        push_filter(&mut builder, filter);

        let row: (i64, Option<i64>, Option<i64>, Option<i64>, Option<i64>, Option<i64>) =
            builder.build_query_as().fetch_one(&self.pool).await?;
        Ok(TaskStats {
            total: row.0,
            completed: row.1.unwrap_or(0),
            failed: row.2.unwrap_or(0),
            cancelled: row.3.unwrap_or(0),
            processing: row.4.unwrap_or(0),
            pending: row.5.unwrap_or(0),
        })
    }

    async fn list_processing(&self) -> OrchestratorResult<Vec<Task>> {
        self.list_by_status(TaskStatus::Processing).await
    }

    async fn list_by_status(&self, status: TaskStatus) -> OrchestratorResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE status = ?")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Task::try_from).collect()
    }
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a TaskFilter) {
    let mut separated = builder.separated(" AND ");
    separated.push(" WHERE is_deleted = ");
    separated.push_bind_unseparated(filter.deleted.unwrap_or(false));

    if let Some(status) = filter.status {
        separated.push("status = ");
        separated.push_bind_unseparated(status.as_str());
    }
    if let Some(user_id) = &filter.user_id {
        separated.push("user_id = ");
        separated.push_bind_unseparated(user_id.as_str());
    }
    if let Some(task_name) = &filter.task_name {
        separated.push("name LIKE ");
        separated.push_bind_unseparated(format!("%{task_name}%"));
    }
    if let Some(favorite) = filter.favorite {
        separated.push("is_favorite = ");
        separated.push_bind_unseparated(favorite);
    }
    if let Some(min) = filter.min_subtasks {
        separated.push("total_images >= ");
        separated.push_bind_unseparated(min);
    }
    if let Some(max) = filter.max_subtasks {
        separated.push("total_images <= ");
        separated.push_bind_unseparated(max);
    }
    if let Some(start) = filter.start_date {
        separated.push("created_at >= ");
        separated.push_bind_unseparated(start.to_rfc3339());
    }
    if let Some(end) = filter.end_date {
        separated.push("created_at <= ");
        separated.push_bind_unseparated(end.to_rfc3339());
    }
}
