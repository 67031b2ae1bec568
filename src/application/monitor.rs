//! Task Monitor (C7): the per-task background loop that recomputes
//! progress, detects terminal state, and runs cancellation cleanup (§4.7).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::OrchestratorResult;
use crate::domain::models::{SubtaskStatus, TaskStatus};
use crate::domain::ports::{Notifier, QueueClient, QueueName, SubtaskRepository, TaskEvent, TaskRepository};

/// Monitor loop cadence (§4.7, §5).
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(10);

pub struct TaskMonitor {
    tasks: Arc<dyn TaskRepository>,
    subtasks: Arc<dyn SubtaskRepository>,
    queue: Arc<dyn QueueClient>,
    notifier: Arc<dyn Notifier>,
}

/// Outcome of one monitor tick, used by the caller to decide whether to
/// keep polling this task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    StillRunning,
    ReachedTerminal,
    /// Task no longer exists (deleted out from under the monitor); also a
    /// signal to stop polling.
    Gone,
}

impl TaskMonitor {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        subtasks: Arc<dyn SubtaskRepository>,
        queue: Arc<dyn QueueClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tasks,
            subtasks,
            queue,
            notifier,
        }
    }

    /// Runs the monitor loop for `task_id` until it reaches a terminal
    /// status or disappears. A duplicate spawn for the same id is
    /// idempotent: both observe the same persisted terminal condition.
    #[instrument(skip(self))]
    pub async fn run(&self, task_id: Uuid) {
        loop {
            match self.tick(task_id).await {
                Ok(TickOutcome::StillRunning) => {
                    tokio::time::sleep(MONITOR_INTERVAL).await;
                }
                Ok(TickOutcome::ReachedTerminal | TickOutcome::Gone) => return,
                Err(err) => {
                    tracing::warn!(%task_id, error = %err, "monitor tick failed, will retry next cycle");
                    tokio::time::sleep(MONITOR_INTERVAL).await;
                }
            }
        }
    }

    /// One iteration of §4.7's algorithm, exposed separately from `run` so
    /// tests can drive it without sleeping.
    pub async fn tick(&self, task_id: Uuid) -> OrchestratorResult<TickOutcome> {
        let Some(mut task) = self.tasks.get(task_id).await? else {
            return Ok(TickOutcome::Gone);
        };
        if task.status.is_terminal() {
            return Ok(TickOutcome::ReachedTerminal);
        }
        if task.status == TaskStatus::Cancelled {
            self.cleanup_cancelled(&mut task).await?;
            return Ok(TickOutcome::ReachedTerminal);
        }

        let subtasks = self.subtasks.list_by_task(task_id).await?;
        let completed = subtasks.iter().filter(|s| s.status == SubtaskStatus::Completed).count() as i64;
        let failed = subtasks.iter().filter(|s| s.status == SubtaskStatus::Failed).count() as i64;
        let cancelled = subtasks.iter().filter(|s| s.status == SubtaskStatus::Cancelled).count() as i64;
        let processed = completed + failed + cancelled;

        task.processed_images = processed;
        task.completed_subtasks = completed;
        task.failed_subtasks = failed;
        task.progress = if task.total_images > 0 {
            ((processed as f64 / task.total_images as f64) * 100.0).floor() as u8
        } else {
            100
        };
        task.updated_at = Utc::now();

        if processed >= task.total_images {
            if completed > 0 {
                task.status = TaskStatus::Completed;
            } else if failed > 0 {
                task.status = TaskStatus::Failed;
            } else if cancelled == task.total_images {
                task.status = TaskStatus::Cancelled;
            }
            task.completed_at = Some(Utc::now());
            self.tasks.update(&task).await?;
            self.notify_completion(&task, completed, failed).await;
            return Ok(TickOutcome::ReachedTerminal);
        }

        self.tasks.update(&task).await?;
        Ok(TickOutcome::StillRunning)
    }

    /// §4.7 Cancellation Cleanup: scrub both broker queues of messages for
    /// subtasks that never started, mark those subtasks cancelled, and
    /// leave in-flight subtasks to finish naturally (P9).
    async fn cleanup_cancelled(&self, task: &mut crate::domain::models::Task) -> OrchestratorResult<()> {
        let cancelled_ids = self.subtasks.cancel_pending(task.id).await?;
        if !cancelled_ids.is_empty() {
            for queue in [QueueName::Normal, QueueName::Ops] {
                self.queue.scrub_containing(queue, &cancelled_ids).await?;
            }
        }
        info!(task_id = %task.id, cancelled = cancelled_ids.len(), "cancellation cleanup complete");

        if task.completed_at.is_none() {
            task.completed_at = Some(Utc::now());
            task.updated_at = Utc::now();
            self.tasks.update(task).await?;
        }
        self.notifier.notify(TaskEvent::TaskCancelled { task_id: task.id }).await;
        Ok(())
    }

    async fn notify_completion(&self, task: &crate::domain::models::Task, completed: i64, failed: i64) {
        let event = match task.status {
            TaskStatus::Completed if failed > 0 => TaskEvent::TaskPartialCompleted {
                task_id: task.id,
                completed,
                failed,
            },
            TaskStatus::Completed => TaskEvent::TaskCompleted {
                task_id: task.id,
                total_images: task.total_images,
            },
            TaskStatus::Failed => TaskEvent::TaskFailed {
                task_id: task.id,
                reason: format!("all {failed} subtasks failed"),
            },
            TaskStatus::Cancelled => TaskEvent::TaskCancelled { task_id: task.id },
            _ => return,
        };
        self.notifier.notify(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::expansion::Expander;
    use crate::domain::models::{ParameterSpec, PromptSpec, ScalarValue, Subtask, Task, TaskSpec};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct InMemory {
        tasks: Mutex<Vec<Task>>,
        subtasks: Mutex<Vec<Subtask>>,
        scrubbed: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl TaskRepository for InMemory {
        async fn create(&self, task: &Task) -> OrchestratorResult<()> {
            self.tasks.lock().unwrap().push(task.clone());
            Ok(())
        }
        async fn get(&self, id: Uuid) -> OrchestratorResult<Option<Task>> {
            Ok(self.tasks.lock().unwrap().iter().find(|t| t.id == id).cloned())
        }
        async fn update(&self, task: &Task) -> OrchestratorResult<()> {
            let mut guard = self.tasks.lock().unwrap();
            if let Some(existing) = guard.iter_mut().find(|t| t.id == task.id) {
                *existing = task.clone();
            }
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
        async fn list_by_status(&self, status: crate::domain::models::TaskStatus) -> OrchestratorResult<Vec<Task>> {
            Ok(self.tasks.lock().unwrap().iter().filter(|t| t.status == status).cloned().collect())
        }
    }

    #[async_trait]
    impl SubtaskRepository for InMemory {
        async fn create_many(&self, subtasks: &[Subtask]) -> OrchestratorResult<()> {
            self.subtasks.lock().unwrap().extend_from_slice(subtasks);
            Ok(())
        }
        async fn get(&self, id: Uuid) -> OrchestratorResult<Option<Subtask>> {
            Ok(self.subtasks.lock().unwrap().iter().find(|s| s.id == id).cloned())
        }
        async fn update(&self, subtask: &Subtask) -> OrchestratorResult<()> {
            let mut guard = self.subtasks.lock().unwrap();
            if let Some(existing) = guard.iter_mut().find(|s| s.id == subtask.id) {
                *existing = subtask.clone();
            }
            Ok(())
        }
        async fn list_by_task(&self, task_id: Uuid) -> OrchestratorResult<Vec<Subtask>> {
            Ok(self.subtasks.lock().unwrap().iter().filter(|s| s.task_id == task_id).cloned().collect())
        }
        async fn claim(&self, id: Uuid) -> OrchestratorResult<bool> {
            let mut guard = self.subtasks.lock().unwrap();
            if let Some(s) = guard.iter_mut().find(|s| s.id == id) {
                if s.status == SubtaskStatus::Pending {
                    s.status = SubtaskStatus::Processing;
                    return Ok(true);
                }
            }
            Ok(false)
        }
        async fn cancel_pending(&self, task_id: Uuid) -> OrchestratorResult<Vec<Uuid>> {
            let mut guard = self.subtasks.lock().unwrap();
            let mut cancelled = vec![];
            for s in guard.iter_mut().filter(|s| s.task_id == task_id && s.status == SubtaskStatus::Pending) {
                s.status = SubtaskStatus::Cancelled;
                s.error = Some("parent task cancelled".to_string());
                cancelled.push(s.id);
            }
            Ok(cancelled)
        }
    }

    #[async_trait]
    impl QueueClient for InMemory {
        async fn enqueue(
            &self,
            _queue: QueueName,
            _job: &crate::domain::ports::SubtaskJob,
            _delay_ms: Option<u64>,
        ) -> OrchestratorResult<()> {
            Ok(())
        }
        async fn scrub_containing(&self, _queue: QueueName, subtask_ids: &[Uuid]) -> OrchestratorResult<u64> {
            self.scrubbed.lock().unwrap().extend_from_slice(subtask_ids);
            Ok(subtask_ids.len() as u64)
        }
    }

    struct NullNotifier;
    #[async_trait]
    impl Notifier for NullNotifier {
        async fn notify(&self, _event: TaskEvent) {}
    }

    fn big_task(n: usize) -> (Task, Vec<Subtask>) {
        let constant = |v: ScalarValue| ParameterSpec {
            is_variable: false,
            format: None,
            value: Some(v),
            variable_id: None,
            variable_name: None,
            variable_values: None,
        };
        let spec = TaskSpec {
            name: None,
            priority: 1,
            prompts: vec![PromptSpec {
                kind: "freetext".to_string(),
                is_variable: true,
                value: None,
                weight: 1.0,
                uuid: None,
                name: None,
                img_url: None,
                variable_id: Some("p".to_string()),
                variable_name: Some("p".to_string()),
                variable_values: Some(
                    (0..n)
                        .map(|i| PromptSpec {
                            kind: "freetext".to_string(),
                            is_variable: false,
                            value: Some(format!("v{i}")),
                            weight: 1.0,
                            uuid: None,
                            name: None,
                            img_url: None,
                            variable_id: None,
                            variable_name: None,
                            variable_values: None,
                        })
                        .collect(),
                ),
            }],
            ratio: constant(ScalarValue::Str("1:1".to_string())),
            seed: constant(ScalarValue::Int(1)),
            batch_size: constant(ScalarValue::Int(1)),
            use_polish: constant(ScalarValue::Bool(false)),
            is_lumina: constant(ScalarValue::Bool(false)),
            lumina_model_name: constant(ScalarValue::Str(String::new())),
            lumina_cfg: constant(ScalarValue::Float(0.0)),
            lumina_step: constant(ScalarValue::Int(0)),
        };
        Expander::default().expand(spec, "u".to_string(), Utc::now()).unwrap()
    }

    fn store(task: Task, subtasks: Vec<Subtask>) -> Arc<InMemory> {
        Arc::new(InMemory {
            tasks: Mutex::new(vec![task]),
            subtasks: Mutex::new(subtasks),
            scrubbed: Mutex::new(vec![]),
        })
    }

    #[tokio::test]
    async fn s6_cancellation_cleanup_marks_only_pending_subtasks() {
        let (mut task, mut subtasks) = big_task(50);
        task.status = TaskStatus::Cancelled;
        subtasks[0].status = SubtaskStatus::Completed;
        subtasks[1].status = SubtaskStatus::Completed;
        subtasks[2].status = SubtaskStatus::Completed;
        subtasks[3].status = SubtaskStatus::Processing;
        let store = store(task.clone(), subtasks);

        let monitor = TaskMonitor::new(store.clone(), store.clone(), store.clone(), Arc::new(NullNotifier));
        let outcome = monitor.tick(task.id).await.unwrap();
        assert_eq!(outcome, TickOutcome::ReachedTerminal);

        let final_subtasks = store.list_by_task(task.id).await.unwrap();
        let cancelled = final_subtasks.iter().filter(|s| s.status == SubtaskStatus::Cancelled).count();
        assert_eq!(cancelled, 46);
        let processing = final_subtasks.iter().filter(|s| s.status == SubtaskStatus::Processing).count();
        assert_eq!(processing, 1);
        assert_eq!(store.scrubbed.lock().unwrap().len(), 46 * 2);
    }

    #[tokio::test]
    async fn task_completes_once_all_subtasks_terminal_with_one_success() {
        let (task, mut subtasks) = big_task(2);
        subtasks[0].status = SubtaskStatus::Completed;
        subtasks[1].status = SubtaskStatus::Failed;
        let store = store(task.clone(), subtasks);
        let monitor = TaskMonitor::new(store.clone(), store.clone(), store.clone(), Arc::new(NullNotifier));
        monitor.tick(task.id).await.unwrap();
        let updated = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.progress, 100);
    }

    #[tokio::test]
    async fn task_fails_when_all_non_cancelled_subtasks_failed() {
        let (task, mut subtasks) = big_task(2);
        subtasks[0].status = SubtaskStatus::Failed;
        subtasks[1].status = SubtaskStatus::Failed;
        let store = store(task.clone(), subtasks);
        let monitor = TaskMonitor::new(store.clone(), store.clone(), store.clone(), Arc::new(NullNotifier));
        monitor.tick(task.id).await.unwrap();
        let updated = store.get(task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn task_stays_processing_while_subtasks_remain_pending() {
        let (task, subtasks) = big_task(2);
        let store = store(task.clone(), subtasks);
        let monitor = TaskMonitor::new(store.clone(), store.clone(), store.clone(), Arc::new(NullNotifier));
        let outcome = monitor.tick(task.id).await.unwrap();
        assert_eq!(outcome, TickOutcome::StillRunning);
    }
}
