//! Admission Controller (C4): gates a freshly persisted task's
//! `pending -> processing` transition on a global concurrency rule and a
//! stricter Lumina mutual-exclusion rule.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::OrchestratorResult;
use crate::domain::models::{Task, TaskStatus};
use crate::domain::ports::TaskRepository;

/// Poll cadence while waiting for a slot (§4.2).
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Fresh-task rate-limit window: a newly `processing` task blocks new
/// admissions for this long (§4.2).
pub const RECENT_TASK_WINDOW: chrono::Duration = chrono::Duration::minutes(10);
/// Overall admission bound; exceeding it fails the task (§4.2, §5).
pub const ADMISSION_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Granted,
    Cancelled,
    Timeout,
}

pub struct AdmissionController {
    tasks: Arc<dyn TaskRepository>,
}

impl AdmissionController {
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self { tasks }
    }

    /// Blocks until `task_id` may transition to `processing`, or the
    /// admission bound (1h) is hit, or the task is cancelled while waiting.
    #[instrument(skip(self))]
    pub async fn await_slot(&self, task_id: Uuid) -> OrchestratorResult<AdmissionOutcome> {
        let deadline = tokio::time::Instant::now() + ADMISSION_TIMEOUT;
        loop {
            let Some(task) = self.tasks.get(task_id).await? else {
                return Ok(AdmissionOutcome::Cancelled);
            };
            if task.status == TaskStatus::Cancelled {
                return Ok(AdmissionOutcome::Cancelled);
            }
            if self.slot_available(&task).await? {
                return Ok(AdmissionOutcome::Granted);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(AdmissionOutcome::Timeout);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Pure decision function over the set of currently-`processing` tasks,
    /// split out so tests can exercise the policy without a sleep loop.
    async fn slot_available(&self, task: &Task) -> OrchestratorResult<bool> {
        let processing = self.tasks.list_processing().await?;
        Ok(slot_available_given(task, &processing, Utc::now()))
    }
}

/// §4.2's policy, as a pure function of the candidate task and the current
/// set of `processing` tasks, for direct unit testing.
pub fn slot_available_given(task: &Task, processing: &[Task], now: chrono::DateTime<Utc>) -> bool {
    if task.is_lumina() && processing.iter().any(|r| r.id != task.id && r.is_lumina()) {
        return false;
    }
    let has_recent = processing
        .iter()
        .any(|r| r.id != task.id && now.signed_duration_since(r.created_at) < RECENT_TASK_WINDOW);
    !has_recent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::expansion::Expander;
    use crate::domain::models::{ParameterSpec, PromptSpec, ScalarValue, TaskSpec};

    fn spec() -> TaskSpec {
        let constant = |v: ScalarValue| ParameterSpec {
            is_variable: false,
            format: None,
            value: Some(v),
            variable_id: None,
            variable_name: None,
            variable_values: None,
        };
        TaskSpec {
            name: None,
            priority: 1,
            prompts: vec![PromptSpec {
                kind: "freetext".to_string(),
                is_variable: false,
                value: Some("cat".to_string()),
                weight: 1.0,
                uuid: None,
                name: None,
                img_url: None,
                variable_id: None,
                variable_name: None,
                variable_values: None,
            }],
            ratio: constant(ScalarValue::Str("1:1".to_string())),
            seed: constant(ScalarValue::Int(1)),
            batch_size: constant(ScalarValue::Int(1)),
            use_polish: constant(ScalarValue::Bool(false)),
            is_lumina: constant(ScalarValue::Bool(false)),
            lumina_model_name: constant(ScalarValue::Str(String::new())),
            lumina_cfg: constant(ScalarValue::Float(0.0)),
            lumina_step: constant(ScalarValue::Int(0)),
        }
    }

    fn make_task(is_lumina: bool, created_at: chrono::DateTime<Utc>) -> Task {
        let mut s = spec();
        s.is_lumina = ParameterSpec {
            is_variable: false,
            format: None,
            value: Some(ScalarValue::Bool(is_lumina)),
            variable_id: None,
            variable_name: None,
            variable_values: None,
        };
        let (mut task, _) = Expander::default().expand(s, "u".to_string(), created_at).unwrap();
        task.status = TaskStatus::Processing;
        task
    }

    #[test]
    fn second_lumina_task_is_blocked_while_first_is_processing() {
        let now = Utc::now();
        let running = make_task(true, now - chrono::Duration::hours(2));
        let candidate = make_task(true, now);
        assert!(!slot_available_given(&candidate, &[running], now));
    }

    #[test]
    fn non_lumina_task_blocked_only_within_recent_window() {
        let now = Utc::now();
        let stale = make_task(false, now - chrono::Duration::minutes(20));
        let candidate = make_task(false, now);
        assert!(slot_available_given(&candidate, &[stale], now));

        let fresh = make_task(false, now - chrono::Duration::minutes(2));
        assert!(!slot_available_given(&candidate, &[fresh], now));
    }

    #[test]
    fn lumina_exclusivity_ignores_the_recent_window_bound() {
        let now = Utc::now();
        let old_lumina = make_task(true, now - chrono::Duration::minutes(59));
        let candidate = make_task(true, now);
        assert!(!slot_available_given(&candidate, &[old_lumina], now));
    }
}
