//! SQLite adapters: connection pooling, embedded migrations, and the
//! repository implementations over `sqlx`.

pub mod connection;
pub mod migrations;
pub mod subtask_repository;
pub mod task_repository;

pub use connection::{create_pool, create_test_pool, ConnectionError, PoolConfig};
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use subtask_repository::SqliteSubtaskRepository;
pub use task_repository::SqliteTaskRepository;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{OrchestratorError, OrchestratorResult};

pub(crate) fn parse_uuid(raw: &str) -> OrchestratorResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| OrchestratorError::DbUnavailable(format!("malformed id {raw}: {e}")))
}

pub(crate) fn parse_datetime(raw: &str) -> OrchestratorResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OrchestratorError::DbUnavailable(format!("malformed timestamp {raw}: {e}")))
}

pub(crate) fn parse_optional_datetime(raw: Option<String>) -> OrchestratorResult<Option<DateTime<Utc>>> {
    raw.map(|s| parse_datetime(&s)).transpose()
}

/// Runs embedded migrations against a freshly created in-memory pool, for
/// use in repository tests.
#[cfg(test)]
pub async fn create_migrated_test_pool() -> sqlx::SqlitePool {
    let pool = create_test_pool().await.expect("test pool");
    let migrator = Migrator::new(pool.clone());
    migrator
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .expect("migrations");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Subtask, SubtaskParams, SubtaskStatus, Task, TaskParameters, TaskStatus};
    use crate::domain::ports::{Page, SubtaskRepository, TaskFilter, TaskRepository};
    use std::collections::BTreeMap;

    fn sample_parameters() -> TaskParameters {
        use crate::domain::models::parameter::Parameter;
        use crate::domain::models::scalar::ScalarValue;
        TaskParameters {
            ratio: Parameter::Constant(ScalarValue::Str("1:1".to_string())),
            seed: Parameter::Constant(ScalarValue::Int(42)),
            batch_size: Parameter::Constant(ScalarValue::Int(1)),
            use_polish: Parameter::Constant(ScalarValue::Bool(false)),
            is_lumina: Parameter::Constant(ScalarValue::Bool(false)),
            lumina_model_name: Parameter::Constant(ScalarValue::Str(String::new())),
            lumina_cfg: Parameter::Constant(ScalarValue::Float(0.0)),
            lumina_step: Parameter::Constant(ScalarValue::Int(0)),
        }
    }

    fn sample_task() -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            name: "roundtrip".to_string(),
            user_id: "user-1".to_string(),
            priority: 1,
            prompts: vec![],
            parameters: sample_parameters(),
            total_images: 1,
            variables: vec![],
            variables_map: BTreeMap::new(),
            status: TaskStatus::Pending,
            processed_images: 0,
            progress: 0,
            completed_subtasks: 0,
            failed_subtasks: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            is_favorite: false,
            is_deleted: false,
        }
    }

    fn sample_subtask(task_id: Uuid) -> Subtask {
        Subtask {
            id: Uuid::new_v4(),
            task_id,
            variable_indices: vec![],
            prompts: vec![],
            params: SubtaskParams {
                ratio: "1:1".to_string(),
                seed: Some(42),
                batch_size: 1,
                use_polish: false,
                is_lumina: false,
                lumina_model_name: None,
                lumina_cfg: None,
                lumina_step: None,
            },
            status: SubtaskStatus::Pending,
            started_at: None,
            completed_at: None,
            error: None,
            result: None,
            timeout_retry_count: 0,
            error_retry_count: 0,
            rating: 0,
            evaluation: vec![],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn task_round_trips_through_sqlite() {
        let pool = create_migrated_test_pool().await;
        let repo = SqliteTaskRepository::new(pool);
        let task = sample_task();
        repo.create(&task).await.unwrap();

        let fetched = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, task.id);
        assert_eq!(fetched.name, task.name);
        assert_eq!(fetched.status, TaskStatus::Pending);

        let mut updated = fetched;
        updated.status = TaskStatus::Completed;
        updated.progress = 100;
        repo.update(&updated).await.unwrap();

        let refetched = repo.get(task.id).await.unwrap().unwrap();
        assert_eq!(refetched.status, TaskStatus::Completed);
        assert_eq!(refetched.progress, 100);
    }

    #[tokio::test]
    async fn list_applies_status_filter_and_pagination() {
        let pool = create_migrated_test_pool().await;
        let repo = SqliteTaskRepository::new(pool);
        for _ in 0..3 {
            let mut task = sample_task();
            task.status = TaskStatus::Processing;
            repo.create(&task).await.unwrap();
        }
        let mut other = sample_task();
        other.status = TaskStatus::Completed;
        repo.create(&other).await.unwrap();

        let filter = TaskFilter {
            status: Some(TaskStatus::Processing),
            ..Default::default()
        };
        let (page, total) = repo.list(&filter, Page { page: 1, page_size: 2 }).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
    }

    #[tokio::test]
    async fn subtask_claim_is_exclusive() {
        let pool = create_migrated_test_pool().await;
        let tasks = SqliteTaskRepository::new(pool.clone());
        let subtasks = SqliteSubtaskRepository::new(pool);

        let task = sample_task();
        tasks.create(&task).await.unwrap();
        let subtask = sample_subtask(task.id);
        subtasks.create_many(&[subtask.clone()]).await.unwrap();

        assert!(subtasks.claim(subtask.id).await.unwrap());
        assert!(!subtasks.claim(subtask.id).await.unwrap());

        let reloaded = subtasks.get(subtask.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, SubtaskStatus::Processing);
        assert!(reloaded.started_at.is_some());
    }

    #[tokio::test]
    async fn cancel_pending_only_touches_pending_rows() {
        let pool = create_migrated_test_pool().await;
        let tasks = SqliteTaskRepository::new(pool.clone());
        let subtasks = SqliteSubtaskRepository::new(pool);

        let task = sample_task();
        tasks.create(&task).await.unwrap();

        let pending = sample_subtask(task.id);
        let mut processing = sample_subtask(task.id);
        processing.status = SubtaskStatus::Processing;
        subtasks
            .create_many(&[pending.clone(), processing.clone()])
            .await
            .unwrap();

        let cancelled = subtasks.cancel_pending(task.id).await.unwrap();
        assert_eq!(cancelled, vec![pending.id]);

        let reloaded_processing = subtasks.get(processing.id).await.unwrap().unwrap();
        assert_eq!(reloaded_processing.status, SubtaskStatus::Processing);
    }
}
