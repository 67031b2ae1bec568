//! The task aggregate: submission shape, validated domain shape, and
//! lifecycle status.

use crate::domain::models::parameter::{Parameter, ParameterSpec};
use crate::domain::models::prompt::{Prompt, PromptSpec};
use crate::domain::models::variable::{VariableDimension, VariableEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
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

/// The seven configurable scalar slots (`batch_size` is always constant,
/// per the spec's resolution of its one ambiguous `SettingField` case).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskParameters {
    pub ratio: Parameter,
    pub seed: Parameter,
    pub batch_size: Parameter,
    pub use_polish: Parameter,
    pub is_lumina: Parameter,
    pub lumina_model_name: Parameter,
    pub lumina_cfg: Parameter,
    pub lumina_step: Parameter,
}

impl TaskParameters {
    /// Whether this task resolves to a Lumina task: either the `is_lumina`
    /// slot is a variable (any of its candidates could make it Lumina,
    /// so it's treated as Lumina for exclusivity/routing purposes) or its
    /// constant value is `true`.
    pub fn is_lumina(&self) -> bool {
        match &self.is_lumina {
            Parameter::Variable { .. } => true,
            Parameter::Constant(v) => v.as_bool().unwrap_or(false),
        }
    }
}

/// Wire shape of a task submission (`POST /api/v1/test/task`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    pub prompts: Vec<PromptSpec>,
    pub ratio: ParameterSpec,
    pub seed: ParameterSpec,
    pub batch_size: ParameterSpec,
    pub use_polish: ParameterSpec,
    pub is_lumina: ParameterSpec,
    pub lumina_model_name: ParameterSpec,
    pub lumina_cfg: ParameterSpec,
    pub lumina_step: ParameterSpec,
}

fn default_priority() -> i32 {
    1
}

impl TaskSpec {
    /// Default name stamped on an unnamed submission: `untitled-YYYYMMDD_HHMMSS`.
    pub fn default_name(now: DateTime<Utc>) -> String {
        format!("untitled-{}", now.format("%Y%m%d_%H%M%S"))
    }
}

/// A persisted, expanded task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub user_id: String,
    pub priority: i32,

    pub prompts: Vec<Prompt>,
    pub parameters: TaskParameters,

    pub total_images: i64,
    pub variables: Vec<VariableDimension>,
    pub variables_map: BTreeMap<String, VariableEntry>,

    pub status: TaskStatus,
    pub processed_images: i64,
    pub progress: u8,
    pub completed_subtasks: i64,
    pub failed_subtasks: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    pub is_favorite: bool,
    pub is_deleted: bool,
}

impl Task {
    pub fn is_lumina(&self) -> bool {
        self.parameters.is_lumina()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_uses_expected_format() {
        let now = DateTime::parse_from_rfc3339("2026-07-28T10:15:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(TaskSpec::default_name(now), "untitled-20260728_101500");
    }

    #[test]
    fn task_status_terminal_classification() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
    }
}
