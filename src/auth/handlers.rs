use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, PublicUser, SigninRequest, SignupRequest},
        repo::User,
        services::{hash_password, is_valid_email, verify_password, AuthUser, JwtKeys},
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if payload.username.is_empty() {
        return Err(ApiError::Validation("Username is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }
    if payload.password != payload.confirm_password {
        return Err(ApiError::Validation("Passwords do not match".into()));
    }

    // Ensure email is not taken
    if User::find_by_email(state.store.as_ref(), &payload.email)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        state.store.as_ref(),
        &payload.username,
        &payload.email,
        &hash,
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email)?;

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id: user.id,
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    Json(mut payload): Json<SigninRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let user = match User::find_by_email(state.store.as_ref(), &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "signin unknown email");
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "signin invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, &user.email)?;

    info!(user_id = %user.id, email = %user.email, "user signed in");
    Ok(Json(AuthResponse {
        user_id: user.id,
        token,
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(state.store.as_ref(), identity.id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    Ok(Json(PublicUser {
        id: user.id,
        username: user.username,
        email: user.email,
        photo_url: user.photo_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup_payload(email: &str) -> SignupRequest {
        SignupRequest {
            username: "student".into(),
            email: email.into(),
            password: "hunter2hunter2".into(),
            confirm_password: "hunter2hunter2".into(),
        }
    }

    #[test]
    fn auth_response_serializes_user_id_and_token() {
        let response = AuthResponse {
            user_id: uuid::Uuid::new_v4(),
            token: "abc".into(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("user_id"));
        assert!(json.contains("token"));
    }

    #[tokio::test]
    async fn signup_then_signin_yields_a_verifiable_token() {
        let state = AppState::fake();

        let (status, Json(created)) = signup(
            State(state.clone()),
            Json(signup_payload("A@Example.com")),
        )
        .await
        .expect("signup succeeds");
        assert_eq!(status, StatusCode::CREATED);

        let Json(signed_in) = signin(
            State(state.clone()),
            Json(SigninRequest {
                email: "a@example.com".into(),
                password: "hunter2hunter2".into(),
            }),
        )
        .await
        .expect("signin succeeds");
        assert_eq!(signed_in.user_id, created.user_id);

        let keys = JwtKeys::from_ref(&state);
        let claims = keys.verify(&signed_in.token).expect("token verifies");
        assert_eq!(claims.sub, created.user_id);
        assert_eq!(claims.email, "a@example.com");
    }

    #[tokio::test]
    async fn signup_rejects_duplicate_email() {
        let state = AppState::fake();

        signup(State(state.clone()), Json(signup_payload("a@example.com")))
            .await
            .expect("first signup succeeds");

        // Same address in a different case is still taken.
        let err = signup(State(state.clone()), Json(signup_payload("A@EXAMPLE.COM")))
            .await
            .err()
            .expect("duplicate signup fails");
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn signin_with_wrong_password_is_rejected() {
        let state = AppState::fake();
        signup(State(state.clone()), Json(signup_payload("a@example.com")))
            .await
            .expect("signup succeeds");

        let err = signin(
            State(state),
            Json(SigninRequest {
                email: "a@example.com".into(),
                password: "wrong-password".into(),
            }),
        )
        .await
        .err()
        .expect("signin fails");
        assert!(matches!(err, ApiError::InvalidCredentials));
    }
}
