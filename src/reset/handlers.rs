use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    error::ApiError,
    reset::{
        dto::{Acknowledgement, CommitPasswordRequest, RequestResetRequest, VerifyCodeRequest},
        services,
    },
    state::AppState,
};

pub fn reset_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/reset/request", post(request_reset))
        .route("/auth/reset/verify", post(verify_code))
        .route("/auth/reset/commit", post(commit_password))
}

#[instrument(skip(state, payload))]
pub async fn request_reset(
    State(state): State<AppState>,
    Json(payload): Json<RequestResetRequest>,
) -> Result<(StatusCode, Json<Acknowledgement>), ApiError> {
    services::request_reset(&state, &payload.email).await?;
    // Same body whether or not the account exists.
    Ok((
        StatusCode::ACCEPTED,
        Json(Acknowledgement {
            message: "If this account exists, a reset code was sent",
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn verify_code(
    State(state): State<AppState>,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<Json<Acknowledgement>, ApiError> {
    services::verify_code(&state, &payload.email, &payload.code).await?;
    Ok(Json(Acknowledgement {
        message: "Code verified",
    }))
}

#[instrument(skip(state, payload))]
pub async fn commit_password(
    State(state): State<AppState>,
    Json(payload): Json<CommitPasswordRequest>,
) -> Result<Json<Acknowledgement>, ApiError> {
    services::commit_password(&state, &payload.email, &payload.new_password).await?;
    Ok(Json(Acknowledgement {
        message: "Password updated",
    }))
}
