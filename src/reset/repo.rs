use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::store::{DocumentStore, StoreError};

pub const RESET_REQUESTS: &str = "reset_requests";
pub const RESET_VERIFICATIONS: &str = "reset_verifications";

pub const CODE_TTL: Duration = Duration::hours(1);
pub const VERIFICATION_TTL: Duration = Duration::minutes(10);

/// A pending one-time code. Verification requires an exact, unconsumed,
/// unexpired match; issuing a new request does not invalidate prior ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetRequest {
    pub id: Uuid,
    pub email: String,
    pub code: String,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
    pub consumed: bool,
}

impl ResetRequest {
    pub async fn create(
        store: &dyn DocumentStore,
        email: &str,
        code: &str,
        now: OffsetDateTime,
    ) -> Result<ResetRequest, StoreError> {
        let request = ResetRequest {
            id: Uuid::new_v4(),
            email: email.to_string(),
            code: code.to_string(),
            created_at: now,
            expires_at: now + CODE_TTL,
            consumed: false,
        };
        store
            .create(
                RESET_REQUESTS,
                &request.id.to_string(),
                serde_json::to_value(&request)?,
            )
            .await?;
        Ok(request)
    }

    pub async fn find_active(
        store: &dyn DocumentStore,
        email: &str,
        code: &str,
    ) -> Result<Option<ResetRequest>, StoreError> {
        let doc = store
            .find_one(
                RESET_REQUESTS,
                json!({ "email": email, "code": code, "consumed": false }),
            )
            .await?;
        doc.map(|d| serde_json::from_value(d.fields).map_err(StoreError::from))
            .transpose()
    }

    /// Guarded consumption: returns false when another verification already
    /// spent this code, so a code is never verifiable twice.
    pub async fn consume(store: &dyn DocumentStore, id: Uuid) -> Result<bool, StoreError> {
        store
            .update_if(
                RESET_REQUESTS,
                &id.to_string(),
                "consumed",
                json!(false),
                json!({ "consumed": true }),
            )
            .await
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}

/// Short-lived capability proving the one-time code was validated; the
/// hand-off between verify and commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetVerification {
    pub id: Uuid,
    pub email: String,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
    pub consumed: bool,
}

impl ResetVerification {
    pub async fn create(
        store: &dyn DocumentStore,
        email: &str,
        now: OffsetDateTime,
    ) -> Result<ResetVerification, StoreError> {
        let verification = ResetVerification {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: now,
            expires_at: now + VERIFICATION_TTL,
            consumed: false,
        };
        store
            .create(
                RESET_VERIFICATIONS,
                &verification.id.to_string(),
                serde_json::to_value(&verification)?,
            )
            .await?;
        Ok(verification)
    }

    /// All unconsumed verifications for the email. More than one can exist
    /// when a verification lapsed and the user verified again, so callers
    /// pick from the full set rather than an arbitrary match.
    pub async fn find_unconsumed(
        store: &dyn DocumentStore,
        email: &str,
    ) -> Result<Vec<ResetVerification>, StoreError> {
        let docs = store
            .find_many(
                RESET_VERIFICATIONS,
                json!({ "email": email, "consumed": false }),
            )
            .await?;
        docs.into_iter()
            .map(|d| serde_json::from_value(d.fields).map_err(StoreError::from))
            .collect()
    }

    pub async fn consume(store: &dyn DocumentStore, id: Uuid) -> Result<bool, StoreError> {
        store
            .update_if(
                RESET_VERIFICATIONS,
                &id.to_string(),
                "consumed",
                json!(false),
                json!({ "consumed": true }),
            )
            .await
    }

    /// Rollback for the commit step when the password update could not be
    /// applied after the capability was already spent.
    pub async fn unconsume(store: &dyn DocumentStore, id: Uuid) -> Result<bool, StoreError> {
        store
            .update(
                RESET_VERIFICATIONS,
                &id.to_string(),
                json!({ "consumed": false }),
            )
            .await
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}
