//! Maps `OrchestratorError` onto the uniform `{code, message, data}`
//! envelope of spec §6, with HTTP status mirroring `code` for errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use image_orchestrator::domain::errors::OrchestratorError;
use serde_json::json;

pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.status_code();
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = self.0.to_string();

        // `data.stack_trace` is only ever attached at debug-log level, not
        // echoed back to the caller (spec §7, closing paragraph).
        tracing::debug!(error = ?self.0, "request failed");

        (status, Json(json!({ "code": code, "message": message, "data": null }))).into_response()
    }
}
