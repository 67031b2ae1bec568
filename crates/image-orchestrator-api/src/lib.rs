//! HTTP surface for the orchestrator (spec §6), an `axum` satellite crate
//! over the core library's `OrchestratorService`. The JWT/user/role auth
//! layer itself is out of scope; `auth::RequireBearerToken` is the
//! stand-in seam, checked against one configured operator token.

mod auth;
mod dto;
mod envelope;
mod error;
mod handlers;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use image_orchestrator::application::service::OrchestratorService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrchestratorService>,
    pub bearer_token: String,
}

/// Build the router for `spec.md` §6's endpoint table. Routes are rooted
/// at `/api/v1/test` (and `/api/v1/auth` for the login stand-in), matching
/// the paths verbatim.
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/auth/token", post(auth::issue_token))
        .route("/api/v1/test/task", post(handlers::task::submit_task))
        .route("/api/v1/test/tasks", get(handlers::task::list_tasks))
        .route("/api/v1/test/tasks/stats", get(handlers::task::task_stats))
        .route("/api/v1/test/task/{id}", get(handlers::task::get_task))
        .route(
            "/api/v1/test/task/{id}/progress",
            get(handlers::task::task_progress),
        )
        .route(
            "/api/v1/test/task/{id}/cancel",
            post(handlers::task::cancel_task),
        )
        .route(
            "/api/v1/test/task/{id}/favorite",
            post(handlers::task::toggle_favorite),
        )
        .route(
            "/api/v1/test/task/{id}/delete",
            post(handlers::task::toggle_deleted),
        )
        .route(
            "/api/v1/test/task/{id}/matrix",
            get(handlers::task::task_matrix),
        )
        .route(
            "/api/v1/test/task/{id}/reuse-config",
            get(handlers::task::reuse_config),
        )
        .route(
            "/api/v1/test/subtask/{id}/rating",
            post(handlers::subtask::set_rating),
        )
        .route(
            "/api/v1/test/subtask/{id}/evaluation",
            post(handlers::subtask::append_evaluation),
        )
        .route(
            "/api/v1/test/subtask/{id}/evaluation/{index}",
            delete(handlers::subtask::remove_evaluation),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is terminated.
pub async fn serve(bind_address: &str, state: AppState) -> anyhow::Result<()> {
    let router = app_router(state);
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::info!(%bind_address, "HTTP API listening");
    axum::serve(listener, router).await?;
    Ok(())
}
