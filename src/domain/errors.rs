//! Error taxonomy for the orchestrator.
//!
//! The broker-retry decision and the HTTP status mapping are both a plain
//! `match` over [`OrchestratorError`] rather than a downcast over an
//! exception hierarchy — see spec Design Notes on "exception control flow
//! to tagged errors".

use thiserror::Error;
use uuid::Uuid;

/// Substrings that flag an upstream failure as content moderation rather
/// than a transient or fatal error, regardless of which language the
/// upstream message is written in.
const CONTENT_CENSORED_MARKERS: &[&str] = &["451", "审核", "敏感", "违规", "不合规", "ILLEGAL_IMAGE"];

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A `TaskSpec` failed validation during expansion (C3). Never persisted.
    #[error("invalid task specification: {0}")]
    SpecInvalid(String),

    /// Caller presented no credentials at all.
    #[error("unauthorized")]
    Unauthorized,

    /// Caller is authenticated but not permitted to perform the operation.
    #[error("forbidden")]
    Forbidden,

    /// Lookup of a task, subtask, or other entity failed.
    #[error("not found: {0}")]
    NotFound(String),

    /// Upstream call failed in a way that should be retried by the broker
    /// (timeout, max-polls exhausted, transient HTTP failure).
    #[error("retryable upstream failure: {0}")]
    Retryable(String),

    /// Upstream flagged the generated content; never retried.
    #[error("content censored: {0}")]
    ContentCensored(String),

    /// Upstream returned an unrecoverable failure, or the result shape was
    /// unusable (missing artifact URL, unknown status).
    #[error("fatal upstream failure: {0}")]
    Fatal(String),

    /// Polling exhausted its attempt cap without reaching a terminal state.
    #[error("max polling attempts exhausted")]
    MaxAttempts,

    /// The admission controller waited the full bound (1h) without a slot.
    #[error("admission timed out waiting for an execution slot")]
    AdmissionTimeout,

    /// Persistence layer unavailable after a reconnect attempt.
    #[error("database unavailable: {0}")]
    DbUnavailable(String),

    /// Cooperative cancellation observed; never surfaced to a client as an
    /// error, only as a status value.
    #[error("cancelled")]
    Cancelled,
}

impl OrchestratorError {
    /// Classify a raw upstream error message into the appropriate variant,
    /// per spec §7's censorship substring table.
    pub fn from_upstream_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if Self::looks_censored(&message) {
            Self::ContentCensored(message)
        } else {
            Self::Fatal(message)
        }
    }

    fn looks_censored(message: &str) -> bool {
        CONTENT_CENSORED_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
    }

    /// Whether the broker should re-deliver the message that produced this
    /// error (subject to the operator's configured retry cap).
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_) | Self::MaxAttempts)
    }

    /// HTTP status code for the uniform `{code, message, data}` envelope.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::SpecInvalid(_) => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound(_) => 404,
            Self::Cancelled => 200,
            Self::AdmissionTimeout
            | Self::Retryable(_)
            | Self::ContentCensored(_)
            | Self::Fatal(_)
            | Self::MaxAttempts => 422,
            Self::DbUnavailable(_) => 500,
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Convenience constructor for a not-found task error.
pub fn task_not_found(id: Uuid) -> OrchestratorError {
    OrchestratorError::NotFound(format!("task {id}"))
}

/// Convenience constructor for a not-found subtask error.
pub fn subtask_not_found(id: Uuid) -> OrchestratorError {
    OrchestratorError::NotFound(format!("subtask {id}"))
}

impl From<sqlx::Error> for OrchestratorError {
    fn from(err: sqlx::Error) -> Self {
        Self::DbUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        Self::SpecInvalid(format!("malformed JSON: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn censorship_markers_are_detected_in_either_language() {
        assert!(matches!(
            OrchestratorError::from_upstream_message("ILLEGAL_IMAGE"),
            OrchestratorError::ContentCensored(_)
        ));
        assert!(matches!(
            OrchestratorError::from_upstream_message("内容审核未通过"),
            OrchestratorError::ContentCensored(_)
        ));
        assert!(matches!(
            OrchestratorError::from_upstream_message("upstream exploded"),
            OrchestratorError::Fatal(_)
        ));
    }

    #[test]
    fn retryable_classification_matches_broker_contract() {
        assert!(OrchestratorError::Retryable("timeout".into()).is_retryable());
        assert!(OrchestratorError::MaxAttempts.is_retryable());
        assert!(!OrchestratorError::ContentCensored("x".into()).is_retryable());
        assert!(!OrchestratorError::Fatal("x".into()).is_retryable());
    }
}
