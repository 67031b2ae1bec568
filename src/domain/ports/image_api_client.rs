//! Image API client port (C2): one-shot submit plus bounded polling of the
//! upstream image-generation service.

use async_trait::async_trait;

use crate::domain::errors::OrchestratorResult;
use crate::domain::models::{ConstantPrompt, SubtaskParams};

/// Everything C2 needs to build the upstream request body; materialized
/// directly from a `Subtask`.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompts: Vec<ConstantPrompt>,
    pub params: SubtaskParams,
}

/// Successful terminal result of `Generate`.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateResult {
    pub image_url: String,
    pub seed_used: i64,
}

/// Port over the upstream image-generation HTTP API.
#[async_trait]
pub trait ImageApiClient: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> OrchestratorResult<GenerateResult>;
}
