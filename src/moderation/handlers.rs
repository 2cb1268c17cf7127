use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, MaybeAuthUser},
    error::ApiError,
    moderation::{
        dto::{ContentResponse, DecideRequest, ListQuery, SubmitRequest, SubmitResponse},
        services,
    },
    state::AppState,
};

pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/content", post(submit).get(list))
        .route("/content/:id/decision", put(decide))
        .route("/content/:id", delete(remove))
}

#[instrument(skip(state, payload))]
pub async fn submit(
    State(state): State<AppState>,
    AuthUser(owner): AuthUser,
    Json(payload): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let content = services::submit(&state, &owner, payload.kind, &payload.title, payload.body)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            content_id: content.id,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn decide(
    State(state): State<AppState>,
    AuthUser(moderator): AuthUser,
    Path(content_id): Path<Uuid>,
    Json(payload): Json<DecideRequest>,
) -> Result<Json<ContentResponse>, ApiError> {
    let content = services::decide(&state, &moderator, content_id, payload.decision).await?;
    Ok(Json(content.into()))
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ContentResponse>>, ApiError> {
    let items = services::list(&state, query.kind, viewer.as_ref()).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(content_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    services::delete(&state, &requester, content_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
