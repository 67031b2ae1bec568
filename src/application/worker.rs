//! Subtask Worker (C6): dequeues a subtask id, drives the image API client,
//! persists the outcome, and decides broker-retry eligibility.

use std::sync::Arc;

use chrono::Utc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{SubtaskStatus, Task};
use crate::domain::ports::{
    GenerateRequest, ImageApiClient, Notifier, SubtaskRepository, TaskEvent, TaskRepository,
};

pub struct SubtaskWorker {
    subtasks: Arc<dyn SubtaskRepository>,
    tasks: Arc<dyn TaskRepository>,
    image_api: Arc<dyn ImageApiClient>,
    notifier: Arc<dyn Notifier>,
    /// `0` disables retries entirely (Open Question resolution: retries
    /// default to disabled; enabled only when the operator raises this).
    max_retries: u32,
}

impl SubtaskWorker {
    pub fn new(
        subtasks: Arc<dyn SubtaskRepository>,
        tasks: Arc<dyn TaskRepository>,
        image_api: Arc<dyn ImageApiClient>,
        notifier: Arc<dyn Notifier>,
        max_retries: u32,
    ) -> Self {
        Self {
            subtasks,
            tasks,
            image_api,
            notifier,
            max_retries,
        }
    }

    /// Handle one delivery of `subtask_id`. `delivery_attempt` is the
    /// broker's redelivery counter (0 on first delivery); used to update
    /// `error_retry_count`/`timeout_retry_count` and to cap retries.
    ///
    /// Returns `Ok(())` when the broker should ack the message (including
    /// when the subtask already left `pending`/`processing`, a no-op), and
    /// an error only when the broker should redeliver it.
    #[instrument(skip(self))]
    pub async fn process(&self, subtask_id: Uuid) -> OrchestratorResult<()> {
        let Some(mut subtask) = self.subtasks.get(subtask_id).await? else {
            return Ok(());
        };
        if subtask.status != SubtaskStatus::Pending && subtask.status != SubtaskStatus::Processing {
            return Ok(());
        }

        if !self.subtasks.claim(subtask_id).await? {
            // Another worker already owns this delivery; redundant
            // delivery becomes a no-op (§5 "Ordering guarantees").
            return Ok(());
        }

        subtask.status = SubtaskStatus::Processing;
        subtask.started_at = Some(Utc::now());
        self.subtasks.update(&subtask).await?;

        let request = GenerateRequest {
            prompts: subtask.prompts.clone(),
            params: subtask.params.clone(),
        };

        let task = self.tasks.get(subtask.task_id).await?;

        match self.image_api.generate(&request).await {
            Ok(result) => {
                subtask.result = Some(result.image_url);
                subtask.status = SubtaskStatus::Completed;
                subtask.completed_at = Some(Utc::now());
                self.subtasks.update(&subtask).await?;
                self.notify_terminal(&subtask, &task).await;
                Ok(())
            }
            Err(OrchestratorError::ContentCensored(message)) => {
                subtask.error = Some(message);
                subtask.status = SubtaskStatus::Failed;
                subtask.completed_at = Some(Utc::now());
                self.subtasks.update(&subtask).await?;
                self.notify_terminal(&subtask, &task).await;
                Ok(())
            }
            Err(err @ (OrchestratorError::Retryable(_) | OrchestratorError::MaxAttempts)) => {
                let message = err.to_string();
                subtask.record_retry(&message);
                subtask.error = Some(message);
                subtask.status = SubtaskStatus::Failed;
                subtask.completed_at = Some(Utc::now());
                self.subtasks.update(&subtask).await?;
                self.notify_terminal(&subtask, &task).await;
                if self.max_retries > 0 && subtask.error_retry_count + subtask.timeout_retry_count <= self.max_retries as i32
                {
                    Err(err)
                } else {
                    Ok(())
                }
            }
            Err(other) => {
                // Reclassify the raw message through the same censorship
                // substring table C2 applies (spec §7): a `Fatal` whose
                // text mentions "451"/审核/敏感/违规/不合规 is content
                // censorship, not a generic fatal failure, mirroring the
                // original's `if "451" in str(e) or "审核" in str(e) ...`
                // check at the worker level.
                match OrchestratorError::from_upstream_message(other.to_string()) {
                    OrchestratorError::ContentCensored(message) => {
                        subtask.error = Some(message);
                    }
                    _ => {
                        let message = other.to_string();
                        subtask.record_retry(&message);
                        subtask.error = Some(message);
                    }
                }
                subtask.status = SubtaskStatus::Failed;
                subtask.completed_at = Some(Utc::now());
                self.subtasks.update(&subtask).await?;
                self.notify_terminal(&subtask, &task).await;
                Ok(())
            }
        }
    }

    async fn notify_terminal(&self, subtask: &crate::domain::models::Subtask, task: &Option<Task>) {
        let Some(task) = task else {
            warn!(subtask_id = %subtask.id, "parent task missing while firing terminal notification");
            return;
        };
        self.notifier
            .notify(TaskEvent::SubtaskTerminal {
                task_id: task.id,
                subtask_id: subtask.id,
                status: subtask.status.as_str().to_string(),
                error: subtask.error.clone(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ConstantPrompt, Subtask, SubtaskParams};
    use crate::domain::ports::GenerateResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeSubtasks(Mutex<Vec<Subtask>>);

    #[async_trait]
    impl SubtaskRepository for FakeSubtasks {
        async fn create_many(&self, subtasks: &[Subtask]) -> OrchestratorResult<()> {
            self.0.lock().unwrap().extend_from_slice(subtasks);
            Ok(())
        }
        async fn get(&self, id: Uuid) -> OrchestratorResult<Option<Subtask>> {
            Ok(self.0.lock().unwrap().iter().find(|s| s.id == id).cloned())
        }
        async fn update(&self, subtask: &Subtask) -> OrchestratorResult<()> {
            let mut guard = self.0.lock().unwrap();
            if let Some(existing) = guard.iter_mut().find(|s| s.id == subtask.id) {
                *existing = subtask.clone();
            }
            Ok(())
        }
        async fn list_by_task(&self, task_id: Uuid) -> OrchestratorResult<Vec<Subtask>> {
            Ok(self.0.lock().unwrap().iter().filter(|s| s.task_id == task_id).cloned().collect())
        }
        async fn claim(&self, id: Uuid) -> OrchestratorResult<bool> {
            let mut guard = self.0.lock().unwrap();
            if let Some(s) = guard.iter_mut().find(|s| s.id == id) {
                if s.status == SubtaskStatus::Pending {
                    s.status = SubtaskStatus::Processing;
                    return Ok(true);
                }
            }
            Ok(false)
        }
        async fn cancel_pending(&self, _task_id: Uuid) -> OrchestratorResult<Vec<Uuid>> {
            Ok(vec![])
        }
    }

    struct FakeTasks;
    #[async_trait]
    impl TaskRepository for FakeTasks {
        async fn create(&self, _task: &Task) -> OrchestratorResult<()> {
            Ok(())
        }
        async fn get(&self, _id: Uuid) -> OrchestratorResult<Option<Task>> {
            Ok(None)
        }
        async fn update(&self, _task: &Task) -> OrchestratorResult<()> {
            Ok(())
        }
        async fn list(
            &self,
            _filter: &crate::domain::ports::TaskFilter,
            _page: crate::domain::ports::Page,
        ) -> OrchestratorResult<(Vec<Task>, i64)> {
            Ok((vec![], 0))
        }
        async fn stats(&self, _filter: &crate::domain::ports::TaskFilter) -> OrchestratorResult<crate::domain::ports::TaskStats> {
            Ok(Default::default())
        }
        async fn list_processing(&self) -> OrchestratorResult<Vec<Task>> {
            Ok(vec![])
        }
        async fn list_by_status(&self, _status: crate::domain::models::TaskStatus) -> OrchestratorResult<Vec<Task>> {
            Ok(vec![])
        }
    }

    struct FakeImageApi(OrchestratorResult<GenerateResult>);
    #[async_trait]
    impl ImageApiClient for FakeImageApi {
        async fn generate(&self, _request: &GenerateRequest) -> OrchestratorResult<GenerateResult> {
            match &self.0 {
                Ok(r) => Ok(r.clone()),
                Err(OrchestratorError::ContentCensored(m)) => Err(OrchestratorError::ContentCensored(m.clone())),
                Err(OrchestratorError::Retryable(m)) => Err(OrchestratorError::Retryable(m.clone())),
                Err(_) => Err(OrchestratorError::Fatal("fake".to_string())),
            }
        }
    }

    struct NullNotifier;
    #[async_trait]
    impl Notifier for NullNotifier {
        async fn notify(&self, _event: TaskEvent) {}
    }

    fn sample_subtask() -> Subtask {
        Subtask {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            variable_indices: vec![],
            prompts: vec![ConstantPrompt::Freetext {
                value: "cat".to_string(),
                weight: 1.0,
            }],
            params: SubtaskParams {
                ratio: "1:1".to_string(),
                seed: Some(1),
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
    async fn successful_generation_completes_the_subtask() {
        let subtask = sample_subtask();
        let id = subtask.id;
        let repo = Arc::new(FakeSubtasks(Mutex::new(vec![subtask])));
        let worker = SubtaskWorker::new(
            repo.clone(),
            Arc::new(FakeTasks),
            Arc::new(FakeImageApi(Ok(GenerateResult {
                image_url: "https://img/x.png".to_string(),
                seed_used: 1,
            }))),
            Arc::new(NullNotifier),
            0,
        );
        worker.process(id).await.unwrap();
        let updated = repo.get(id).await.unwrap().unwrap();
        assert_eq!(updated.status, SubtaskStatus::Completed);
        assert_eq!(updated.result.as_deref(), Some("https://img/x.png"));
    }

    #[tokio::test]
    async fn content_censored_fails_without_retry() {
        let subtask = sample_subtask();
        let id = subtask.id;
        let repo = Arc::new(FakeSubtasks(Mutex::new(vec![subtask])));
        let worker = SubtaskWorker::new(
            repo.clone(),
            Arc::new(FakeTasks),
            Arc::new(FakeImageApi(Err(OrchestratorError::ContentCensored("ILLEGAL_IMAGE".to_string())))),
            Arc::new(NullNotifier),
            3,
        );
        let result = worker.process(id).await;
        assert!(result.is_ok());
        let updated = repo.get(id).await.unwrap().unwrap();
        assert_eq!(updated.status, SubtaskStatus::Failed);
        assert_eq!(updated.timeout_retry_count, 0);
    }

    #[tokio::test]
    async fn retryable_error_propagates_when_retries_enabled() {
        let subtask = sample_subtask();
        let id = subtask.id;
        let repo = Arc::new(FakeSubtasks(Mutex::new(vec![subtask])));
        let worker = SubtaskWorker::new(
            repo.clone(),
            Arc::new(FakeTasks),
            Arc::new(FakeImageApi(Err(OrchestratorError::Retryable("timeout polling".to_string())))),
            Arc::new(NullNotifier),
            3,
        );
        let result = worker.process(id).await;
        assert!(result.is_err());
        let updated = repo.get(id).await.unwrap().unwrap();
        assert_eq!(updated.status, SubtaskStatus::Failed);
        assert_eq!(updated.timeout_retry_count, 1);
    }

    #[tokio::test]
    async fn retryable_error_does_not_propagate_when_retries_disabled() {
        let subtask = sample_subtask();
        let id = subtask.id;
        let repo = Arc::new(FakeSubtasks(Mutex::new(vec![subtask])));
        let worker = SubtaskWorker::new(
            repo.clone(),
            Arc::new(FakeTasks),
            Arc::new(FakeImageApi(Err(OrchestratorError::Retryable("timeout".to_string())))),
            Arc::new(NullNotifier),
            0,
        );
        let result = worker.process(id).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn redundant_delivery_of_a_non_pending_subtask_is_a_no_op() {
        let mut subtask = sample_subtask();
        subtask.status = SubtaskStatus::Completed;
        let id = subtask.id;
        let repo = Arc::new(FakeSubtasks(Mutex::new(vec![subtask])));
        let worker = SubtaskWorker::new(
            repo.clone(),
            Arc::new(FakeTasks),
            Arc::new(FakeImageApi(Ok(GenerateResult {
                image_url: "should-not-be-used".to_string(),
                seed_used: 1,
            }))),
            Arc::new(NullNotifier),
            0,
        );
        worker.process(id).await.unwrap();
        let updated = repo.get(id).await.unwrap().unwrap();
        assert_eq!(updated.status, SubtaskStatus::Completed);
    }
}
