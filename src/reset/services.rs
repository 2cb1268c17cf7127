use rand::Rng;
use time::OffsetDateTime;
use tracing::info;

use crate::auth::repo::User;
use crate::auth::services::{hash_password, is_valid_email};
use crate::error::ApiError;
use crate::mail;
use crate::reset::repo::{ResetRequest, ResetVerification};
use crate::state::AppState;

/// Uniformly random 6-digit one-time code.
pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Step 1. Always acknowledges generically so an attacker cannot probe which
/// emails are registered. Mail dispatch is fire-and-forget.
pub async fn request_reset(state: &AppState, email: &str) -> Result<(), ApiError> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let store = state.store.as_ref();
    if User::find_by_email(store, &email).await?.is_none() {
        // Same acknowledgement as the registered case.
        return Ok(());
    }

    let code = generate_code();
    let now = OffsetDateTime::now_utc();
    ResetRequest::create(store, &email, &code, now).await?;
    info!(email = %email, "reset requested");

    mail::dispatch_reset_code(state.mailer.clone(), email, code);
    Ok(())
}

/// Step 2. Exact unconsumed match required; consumption is guarded so the
/// code cannot be verified twice even when two attempts race.
pub async fn verify_code(state: &AppState, email: &str, code: &str) -> Result<(), ApiError> {
    let email = email.trim().to_lowercase();
    let store = state.store.as_ref();

    let request = ResetRequest::find_active(store, &email, code)
        .await?
        .ok_or(ApiError::InvalidCode)?;

    let now = OffsetDateTime::now_utc();
    if request.is_expired(now) {
        return Err(ApiError::CodeExpired);
    }

    if !ResetRequest::consume(store, request.id).await? {
        // Lost the race: another verification already spent this code.
        return Err(ApiError::InvalidCode);
    }

    ResetVerification::create(store, &email, now).await?;
    info!(email = %email, "reset code verified");
    Ok(())
}

/// Step 3. Requires the capability from step 2; consuming it and updating the
/// password form one logical step, so a failed update puts it back.
pub async fn commit_password(
    state: &AppState,
    email: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    if new_password.len() < 8 {
        return Err(ApiError::Validation("Password too short".into()));
    }
    let email = email.trim().to_lowercase();
    let store = state.store.as_ref();

    let user = User::find_by_email(store, &email)
        .await?
        .ok_or(ApiError::NotVerified)?;

    let candidates = ResetVerification::find_unconsumed(store, &email).await?;
    if candidates.is_empty() {
        return Err(ApiError::NotVerified);
    }

    // A lapsed verification must not shadow a fresh one issued afterwards;
    // only when every unconsumed verification has expired is the caller told
    // to start over.
    let now = OffsetDateTime::now_utc();
    let verification = candidates
        .into_iter()
        .find(|v| !v.is_expired(now))
        .ok_or(ApiError::VerificationExpired)?;

    let hash = hash_password(new_password)?;

    if !ResetVerification::consume(store, verification.id).await? {
        return Err(ApiError::NotVerified);
    }

    match User::set_password_hash(store, user.id, &hash).await {
        Ok(true) => {
            info!(user_id = %user.id, "password reset committed");
            Ok(())
        }
        Ok(false) => {
            let _ = ResetVerification::unconsume(store, verification.id).await;
            Err(ApiError::NotFound)
        }
        Err(e) => {
            let _ = ResetVerification::unconsume(store, verification.id).await;
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::services::verify_password;
    use crate::reset::repo::{RESET_REQUESTS, RESET_VERIFICATIONS};
    use serde_json::json;
    use time::Duration;

    async fn seed_user(state: &AppState, email: &str, password: &str) -> User {
        let hash = hash_password(password).unwrap();
        User::create(state.store.as_ref(), "student", email, &hash)
            .await
            .unwrap()
    }

    async fn issued_code(state: &AppState, email: &str) -> String {
        let doc = state
            .store
            .find_one(RESET_REQUESTS, json!({ "email": email }))
            .await
            .unwrap()
            .expect("reset request persisted");
        doc.fields["code"].as_str().unwrap().to_string()
    }

    #[test]
    fn generated_codes_are_six_decimal_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn full_flow_updates_the_password() {
        let state = AppState::fake();
        let user = seed_user(&state, "a@example.com", "old-password").await;

        request_reset(&state, "a@example.com").await.unwrap();
        let code = issued_code(&state, "a@example.com").await;

        verify_code(&state, "a@example.com", &code).await.unwrap();
        commit_password(&state, "a@example.com", "new-password-1")
            .await
            .unwrap();

        let stored = User::find_by_id(state.store.as_ref(), user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(verify_password("new-password-1", &stored.password_hash).unwrap());
        assert!(!verify_password("old-password", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn request_for_unknown_email_is_silent_and_persists_nothing() {
        let state = AppState::fake();
        request_reset(&state, "ghost@example.com").await.unwrap();
        let doc = state
            .store
            .find_one(RESET_REQUESTS, json!({ "email": "ghost@example.com" }))
            .await
            .unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn code_is_single_use() {
        let state = AppState::fake();
        seed_user(&state, "a@example.com", "old-password").await;
        request_reset(&state, "a@example.com").await.unwrap();
        let code = issued_code(&state, "a@example.com").await;

        verify_code(&state, "a@example.com", &code).await.unwrap();
        let err = verify_code(&state, "a@example.com", &code).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidCode));
    }

    #[tokio::test]
    async fn wrong_code_is_rejected() {
        let state = AppState::fake();
        seed_user(&state, "a@example.com", "old-password").await;
        request_reset(&state, "a@example.com").await.unwrap();

        let err = verify_code(&state, "a@example.com", "000000").await.err();
        // A collision with the real code is the only way this is not an error.
        if issued_code(&state, "a@example.com").await != "000000" {
            assert!(matches!(err, Some(ApiError::InvalidCode)));
        }
    }

    #[tokio::test]
    async fn expired_code_is_rejected_even_on_first_use() {
        let state = AppState::fake();
        seed_user(&state, "a@example.com", "old-password").await;
        let past = OffsetDateTime::now_utc() - Duration::minutes(61);
        ResetRequest::create(state.store.as_ref(), "a@example.com", "123456", past)
            .await
            .unwrap();

        let err = verify_code(&state, "a@example.com", "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::CodeExpired));
    }

    #[tokio::test]
    async fn commit_without_verify_is_rejected() {
        let state = AppState::fake();
        seed_user(&state, "a@example.com", "old-password").await;

        let err = commit_password(&state, "a@example.com", "new-password-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotVerified));
    }

    #[tokio::test]
    async fn expired_verification_is_rejected() {
        let state = AppState::fake();
        seed_user(&state, "a@example.com", "old-password").await;
        let past = OffsetDateTime::now_utc() - Duration::minutes(11);
        ResetVerification::create(state.store.as_ref(), "a@example.com", past)
            .await
            .unwrap();

        let err = commit_password(&state, "a@example.com", "new-password-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::VerificationExpired));
    }

    #[tokio::test]
    async fn stale_verification_does_not_shadow_a_fresh_one() {
        let state = AppState::fake();
        let user = seed_user(&state, "a@example.com", "old-password").await;
        let store = state.store.as_ref();

        // An earlier verification lapsed, then the user verified again. Both
        // are unconsumed; commit must find the one still inside its window.
        // The stale record gets the nil id so it always sorts ahead of the
        // fresh one.
        let past = OffsetDateTime::now_utc() - Duration::minutes(11);
        let stale = ResetVerification {
            id: uuid::Uuid::nil(),
            email: "a@example.com".into(),
            created_at: past,
            expires_at: past + crate::reset::repo::VERIFICATION_TTL,
            consumed: false,
        };
        store
            .create(
                RESET_VERIFICATIONS,
                &stale.id.to_string(),
                serde_json::to_value(&stale).unwrap(),
            )
            .await
            .unwrap();
        ResetVerification::create(store, "a@example.com", OffsetDateTime::now_utc())
            .await
            .unwrap();

        commit_password(&state, "a@example.com", "new-password-1")
            .await
            .unwrap();

        let stored = User::find_by_id(store, user.id).await.unwrap().unwrap();
        assert!(verify_password("new-password-1", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn commit_consumes_the_verification() {
        let state = AppState::fake();
        seed_user(&state, "a@example.com", "old-password").await;
        request_reset(&state, "a@example.com").await.unwrap();
        let code = issued_code(&state, "a@example.com").await;
        verify_code(&state, "a@example.com", &code).await.unwrap();

        commit_password(&state, "a@example.com", "new-password-1")
            .await
            .unwrap();
        let active = state
            .store
            .find_one(
                RESET_VERIFICATIONS,
                json!({ "email": "a@example.com", "consumed": false }),
            )
            .await
            .unwrap();
        assert!(active.is_none());

        let err = commit_password(&state, "a@example.com", "another-password")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotVerified));
    }
}
