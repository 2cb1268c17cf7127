use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::AuthUser,
    error::ApiError,
    state::AppState,
    votes::{
        dto::{CastVoteRequest, RemoveVoteRequest},
        repo::{Tally, TargetKind},
        services,
    },
};

pub fn vote_routes() -> Router<AppState> {
    Router::new()
        .route("/votes", post(cast_vote).delete(remove_vote))
        .route("/votes/:kind/:target_id", get(get_tally))
}

#[instrument(skip(state, payload))]
pub async fn cast_vote(
    State(state): State<AppState>,
    AuthUser(voter): AuthUser,
    Json(payload): Json<CastVoteRequest>,
) -> Result<Json<Tally>, ApiError> {
    let tally = services::cast_vote(
        &state,
        &voter,
        &payload.target_id,
        payload.target_kind,
        payload.direction,
    )
    .await?;
    Ok(Json(tally))
}

#[instrument(skip(state, payload))]
pub async fn remove_vote(
    State(state): State<AppState>,
    AuthUser(voter): AuthUser,
    Json(payload): Json<RemoveVoteRequest>,
) -> Result<Json<Tally>, ApiError> {
    let tally =
        services::remove_vote(&state, &voter, &payload.target_id, payload.target_kind).await?;
    Ok(Json(tally))
}

#[instrument(skip(state))]
pub async fn get_tally(
    State(state): State<AppState>,
    Path((kind, target_id)): Path<(TargetKind, String)>,
) -> Result<Json<Tally>, ApiError> {
    let tally = services::get_tally(&state, &target_id, kind).await?;
    Ok(Json(tally))
}
