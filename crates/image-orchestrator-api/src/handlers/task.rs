use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use image_orchestrator::application::service::OrchestratorService;
use image_orchestrator::domain::models::TaskSpec;
use uuid::Uuid;

use crate::auth::RequireBearerToken;
use crate::dto::{
    CancelResponse, DeleteResponse, FavoriteResponse, IncludeSubtasksQuery, ProgressResponse,
    SubmitResponse, TaskDetail, TaskListQuery, TaskListResponse, TaskStatsResponse,
};
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::AppState;

fn user_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "anonymous".to_string())
}

pub async fn submit_task(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(spec): Json<TaskSpec>,
) -> Result<Envelope<SubmitResponse>, ApiError> {
    let user_id = user_id_from_headers(&headers);
    let task_id = state.service.submit(spec, user_id).await?;
    Ok(Envelope::ok(SubmitResponse {
        task_id,
        queue: "normal",
    }))
}

pub async fn list_tasks(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> Result<Envelope<TaskListResponse>, ApiError> {
    let page = query.page();
    let (tasks, total) = state.service.list(&query.filter(), page).await?;
    Ok(Envelope::ok(TaskListResponse {
        tasks,
        total,
        page: page.page,
        page_size: page.page_size,
    }))
}

pub async fn task_stats(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> Result<Envelope<TaskStatsResponse>, ApiError> {
    let stats = state.service.stats(&query.filter()).await?;
    Ok(Envelope::ok(stats.into()))
}

pub async fn get_task(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(include): Query<IncludeSubtasksQuery>,
) -> Result<Envelope<TaskDetail>, ApiError> {
    let task = task_by_id(&state.service, id).await?;
    let subtasks = if include.include_subtasks {
        Some(state.service.list_subtasks(id).await?)
    } else {
        None
    };
    Ok(Envelope::ok(TaskDetail { task, subtasks }))
}

pub async fn task_progress(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Envelope<ProgressResponse>, ApiError> {
    let task = task_by_id(&state.service, id).await?;
    Ok(Envelope::ok(ProgressResponse::from(&task)))
}

pub async fn cancel_task(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Envelope<CancelResponse>, ApiError> {
    state.service.cancel(id).await?;
    Ok(Envelope::ok(CancelResponse {
        task_id: id,
        message: "task cancelled",
    }))
}

pub async fn toggle_favorite(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Envelope<FavoriteResponse>, ApiError> {
    let is_favorite = state.service.toggle_favorite(id).await?;
    Ok(Envelope::ok(FavoriteResponse {
        task_id: id,
        is_favorite,
    }))
}

pub async fn toggle_deleted(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Envelope<DeleteResponse>, ApiError> {
    let is_deleted = state.service.toggle_deleted(id).await?;
    Ok(Envelope::ok(DeleteResponse {
        task_id: id,
        is_deleted,
    }))
}

pub async fn task_matrix(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Envelope<image_orchestrator::application::matrix::MatrixView>, ApiError> {
    let view = state.service.matrix(id).await?;
    Ok(Envelope::ok(view))
}

pub async fn reuse_config(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Envelope<image_orchestrator::domain::models::Task>, ApiError> {
    let task = state.service.reuse_config(id).await?;
    Ok(Envelope::ok(task))
}

async fn task_by_id(
    service: &Arc<OrchestratorService>,
    id: Uuid,
) -> Result<image_orchestrator::domain::models::Task, ApiError> {
    Ok(service.get(id).await?)
}
