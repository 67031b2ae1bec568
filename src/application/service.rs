//! Orchestrator service facade: the use cases behind every HTTP endpoint
//! and CLI subcommand of spec §6, composed from the repository/queue/
//! notifier ports and the C3–C8 components.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::application::admission::{AdmissionController, AdmissionOutcome};
use crate::application::dispatch::DispatchScheduler;
use crate::application::expansion::Expander;
use crate::application::matrix::{self, MatrixView};
use crate::application::monitor::TaskMonitor;
use crate::domain::errors::{task_not_found, subtask_not_found, OrchestratorError, OrchestratorResult};
use crate::domain::models::{Task, TaskSpec, TaskStatus};
use crate::domain::ports::{
    Notifier, Page, QueueClient, SubtaskRepository, TaskEvent, TaskFilter, TaskRepository, TaskStats,
};

pub struct OrchestratorService {
    tasks: Arc<dyn TaskRepository>,
    subtasks: Arc<dyn SubtaskRepository>,
    queue: Arc<dyn QueueClient>,
    notifier: Arc<dyn Notifier>,
    expander: Expander,
}

impl OrchestratorService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        subtasks: Arc<dyn SubtaskRepository>,
        queue: Arc<dyn QueueClient>,
        notifier: Arc<dyn Notifier>,
        expander: Expander,
    ) -> Self {
        Self {
            tasks,
            subtasks,
            queue,
            notifier,
            expander,
        }
    }

    /// `POST /api/v1/test/task`: expand and persist, then spawn the
    /// admission-wait / dispatch / monitor pipeline in the background.
    /// Returns as soon as the task and its subtasks are durable.
    #[instrument(skip(self, spec))]
    pub async fn submit(self: &Arc<Self>, spec: TaskSpec, user_id: String) -> OrchestratorResult<Uuid> {
        let (task, subtasks) = self.expander.expand(spec, user_id, Utc::now())?;
        let task_id = task.id;
        self.tasks.create(&task).await?;
        self.subtasks.create_many(&subtasks).await?;
        self.notifier
            .notify(TaskEvent::TaskSubmitted {
                task_id,
                task_name: task.name.clone(),
            })
            .await;

        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.run_pipeline(task_id).await;
        });

        Ok(task_id)
    }

    /// Admission wait, dispatch, and monitor for one task — the
    /// background continuation of `submit`. Runs entirely off persisted
    /// state so it's safe to respawn on restart (Design Notes §9).
    #[instrument(skip(self))]
    pub async fn run_pipeline(&self, task_id: Uuid) {
        let admission = AdmissionController::new(self.tasks.clone());
        let outcome = match admission.await_slot(task_id).await {
            Ok(o) => o,
            Err(err) => {
                tracing::error!(%task_id, error = %err, "admission wait failed");
                return;
            }
        };

        match outcome {
            AdmissionOutcome::Cancelled => return,
            AdmissionOutcome::Timeout => {
                if let Ok(Some(mut task)) = self.tasks.get(task_id).await {
                    task.status = TaskStatus::Failed;
                    task.completed_at = Some(Utc::now());
                    task.updated_at = Utc::now();
                    let _ = self.tasks.update(&task).await;
                    self.notifier
                        .notify(TaskEvent::TaskFailed {
                            task_id,
                            reason: "admission timed out after 1h".to_string(),
                        })
                        .await;
                }
                return;
            }
            AdmissionOutcome::Granted => {}
        }

        let Ok(Some(mut task)) = self.tasks.get(task_id).await else {
            return;
        };
        task.status = TaskStatus::Processing;
        task.updated_at = Utc::now();
        if self.tasks.update(&task).await.is_err() {
            return;
        }

        let Ok(subtasks) = self.subtasks.list_by_task(task_id).await else {
            return;
        };
        let scheduler = DispatchScheduler::new(self.queue.clone());
        if let Err(err) = scheduler.dispatch(task_id, &subtasks).await {
            tracing::error!(%task_id, error = %err, "dispatch failed");
        }

        let monitor = TaskMonitor::new(
            self.tasks.clone(),
            self.subtasks.clone(),
            self.queue.clone(),
            self.notifier.clone(),
        );
        monitor.run(task_id).await;
    }

    pub async fn get(&self, task_id: Uuid) -> OrchestratorResult<Task> {
        self.tasks.get(task_id).await?.ok_or_else(|| task_not_found(task_id))
    }

    /// `GET /task/{id}/subtasks` (and `?include_subtasks=true` on task
    /// detail): every subtask persisted for this task, in no particular
    /// order beyond what the repository returns.
    pub async fn list_subtasks(
        &self,
        task_id: Uuid,
    ) -> OrchestratorResult<Vec<crate::domain::models::Subtask>> {
        self.subtasks.list_by_task(task_id).await
    }

    pub async fn list(&self, filter: &TaskFilter, page: Page) -> OrchestratorResult<(Vec<Task>, i64)> {
        self.tasks.list(filter, page).await
    }

    pub async fn stats(&self, filter: &TaskFilter) -> OrchestratorResult<TaskStats> {
        self.tasks.stats(filter).await
    }

    /// `POST /task/{id}/cancel`: permitted from `pending` or `processing`
    /// (see DESIGN.md for the resolution of the conflicting restriction in
    /// spec §6's endpoint table versus scenario S6).
    pub async fn cancel(&self, task_id: Uuid) -> OrchestratorResult<()> {
        let mut task = self.get(task_id).await?;
        if task.status.is_terminal() {
            return Err(OrchestratorError::SpecInvalid(format!(
                "task {task_id} is already terminal ({})",
                task.status.as_str()
            )));
        }
        task.status = TaskStatus::Cancelled;
        task.updated_at = Utc::now();
        self.tasks.update(&task).await
    }

    pub async fn set_favorite(&self, task_id: Uuid, favorite: bool) -> OrchestratorResult<bool> {
        let mut task = self.get(task_id).await?;
        task.is_favorite = favorite;
        task.updated_at = Utc::now();
        self.tasks.update(&task).await?;
        Ok(task.is_favorite)
    }

    pub async fn toggle_favorite(&self, task_id: Uuid) -> OrchestratorResult<bool> {
        let mut task = self.get(task_id).await?;
        task.is_favorite = !task.is_favorite;
        task.updated_at = Utc::now();
        self.tasks.update(&task).await?;
        Ok(task.is_favorite)
    }

    pub async fn toggle_deleted(&self, task_id: Uuid) -> OrchestratorResult<bool> {
        let mut task = self.get(task_id).await?;
        task.is_deleted = !task.is_deleted;
        task.updated_at = Utc::now();
        self.tasks.update(&task).await?;
        Ok(task.is_deleted)
    }

    pub async fn matrix(&self, task_id: Uuid) -> OrchestratorResult<MatrixView> {
        let task = self.get(task_id).await?;
        let subtasks = self.subtasks.list_by_task(task_id).await?;
        Ok(matrix::materialize(&task, &subtasks))
    }

    /// `GET /task/{id}/reuse-config`: reconstruct a `TaskSpec`-shaped view
    /// from the persisted, id-normalized task for the "duplicate task" UI
    /// affordance.
    pub async fn reuse_config(&self, task_id: Uuid) -> OrchestratorResult<Task> {
        self.get(task_id).await
    }

    /// `POST /subtask/{id}/rating`: stored range is `0..=5`, writes are
    /// restricted to `1..=5` (Open Question resolution).
    pub async fn set_rating(&self, subtask_id: Uuid, rating: u8) -> OrchestratorResult<()> {
        if !(1..=5).contains(&rating) {
            return Err(OrchestratorError::SpecInvalid(format!(
                "rating must be in 1..=5, got {rating}"
            )));
        }
        let mut subtask = self
            .subtasks
            .get(subtask_id)
            .await?
            .ok_or_else(|| subtask_not_found(subtask_id))?;
        subtask.rating = rating;
        self.subtasks.update(&subtask).await
    }

    pub async fn append_evaluation(&self, subtask_id: Uuid, note: String) -> OrchestratorResult<()> {
        let mut subtask = self
            .subtasks
            .get(subtask_id)
            .await?
            .ok_or_else(|| subtask_not_found(subtask_id))?;
        subtask.evaluation.push(note);
        self.subtasks.update(&subtask).await
    }

    pub async fn remove_evaluation(&self, subtask_id: Uuid, index: usize) -> OrchestratorResult<()> {
        let mut subtask = self
            .subtasks
            .get(subtask_id)
            .await?
            .ok_or_else(|| subtask_not_found(subtask_id))?;
        if index >= subtask.evaluation.len() {
            return Err(OrchestratorError::NotFound(format!(
                "evaluation index {index} on subtask {subtask_id}"
            )));
        }
        subtask.evaluation.remove(index);
        self.subtasks.update(&subtask).await
    }

    /// Respawns a monitor for every task still `processing`, for use at
    /// process startup (Design Notes §9: "no hidden global singletons").
    pub async fn respawn_monitors(self: &Arc<Self>) -> OrchestratorResult<()> {
        let processing = self.tasks.list_by_status(TaskStatus::Processing).await?;
        for task in processing {
            let monitor = TaskMonitor::new(
                self.tasks.clone(),
                self.subtasks.clone(),
                self.queue.clone(),
                self.notifier.clone(),
            );
            tokio::spawn(async move {
                monitor.run(task.id).await;
            });
        }
        Ok(())
    }
}
