//! A single materialized coordinate in a task's Cartesian product.

use crate::domain::models::prompt::ConstantPrompt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl SubtaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// The eight scalar slots, fully concrete (no variable arm left).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskParams {
    pub ratio: String,
    pub seed: Option<i64>,
    pub batch_size: i64,
    pub use_polish: bool,
    pub is_lumina: bool,
    pub lumina_model_name: Option<String>,
    pub lumina_cfg: Option<f64>,
    pub lumina_step: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub task_id: Uuid,

    /// One coordinate per active dimension; empty when the task has no
    /// variables.
    pub variable_indices: Vec<i32>,

    pub prompts: Vec<ConstantPrompt>,
    pub params: SubtaskParams,

    pub status: SubtaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result: Option<String>,
    pub timeout_retry_count: i32,
    pub error_retry_count: i32,

    /// `0` means unrated; stored range is `0..=5`, the update endpoint
    /// only accepts writes of `1..=5`.
    pub rating: u8,
    pub evaluation: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl Subtask {
    pub fn is_lumina(&self) -> bool {
        self.params.is_lumina
    }

    /// Increments the appropriate retry counter based on whether `message`
    /// mentions "timeout" (case-insensitive), per the worker's counting
    /// rule.
    pub fn record_retry(&mut self, message: &str) {
        if message.to_lowercase().contains("timeout") {
            self.timeout_retry_count += 1;
        } else {
            self.error_retry_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: SubtaskStatus) -> Subtask {
        Subtask {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
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
            status,
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

    #[test]
    fn retry_counter_picks_timeout_bucket_case_insensitively() {
        let mut subtask = sample(SubtaskStatus::Processing);
        subtask.record_retry("Request TIMEOUT after 30s");
        assert_eq!(subtask.timeout_retry_count, 1);
        assert_eq!(subtask.error_retry_count, 0);

        subtask.record_retry("upstream returned 500");
        assert_eq!(subtask.timeout_retry_count, 1);
        assert_eq!(subtask.error_retry_count, 1);
    }

    #[test]
    fn terminal_statuses() {
        assert!(sample(SubtaskStatus::Completed).status.is_terminal());
        assert!(sample(SubtaskStatus::Failed).status.is_terminal());
        assert!(sample(SubtaskStatus::Cancelled).status.is_terminal());
        assert!(!sample(SubtaskStatus::Pending).status.is_terminal());
    }
}
