use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::auth::RequireBearerToken;
use crate::dto::{EvaluationRequest, RatingRequest};
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::AppState;

pub async fn set_rating(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RatingRequest>,
) -> Result<Envelope<()>, ApiError> {
    state.service.set_rating(id, body.rating).await?;
    Ok(Envelope::ok(()))
}

pub async fn append_evaluation(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<EvaluationRequest>,
) -> Result<Envelope<()>, ApiError> {
    state.service.append_evaluation(id, body.evaluation).await?;
    Ok(Envelope::ok(()))
}

pub async fn remove_evaluation(
    _auth: RequireBearerToken,
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Envelope<()>, ApiError> {
    state.service.remove_evaluation(id, index).await?;
    Ok(Envelope::ok(()))
}
