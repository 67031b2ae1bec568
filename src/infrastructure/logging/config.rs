use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::super::config::LoggingSection;

/// Logging configuration, derived from the top-level `Config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format for both sinks
    pub format: LogFormat,

    /// Directory for log files; `None` means stdout-only.
    pub log_dir: Option<PathBuf>,

    /// Whether to also write to stdout when `log_dir` is set.
    pub enable_stdout: bool,

    /// Log rotation policy, used only when `log_dir` is set.
    pub rotation: RotationPolicy,

    /// Informational only; actual pruning of old rolled files is left to
    /// the operator's log-shipping setup.
    pub retention_days: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    Daily,
    Hourly,
    Never,
}

impl From<&LoggingSection> for LogConfig {
    fn from(section: &LoggingSection) -> Self {
        let format = match section.format.as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        };
        let rotation = match section.rotation.as_str() {
            "hourly" => RotationPolicy::Hourly,
            "never" => RotationPolicy::Never,
            _ => RotationPolicy::Daily,
        };
        Self {
            level: section.level.clone(),
            format,
            log_dir: section.log_dir.clone(),
            enable_stdout: section.enable_stdout,
            rotation,
            retention_days: section.retention_days,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            log_dir: None,
            enable_stdout: true,
            rotation: RotationPolicy::Daily,
            retention_days: 30,
        }
    }
}
