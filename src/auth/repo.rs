use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::{DocumentStore, StoreError};

pub const USERS: &str = "users";

/// User record in the document store. The identifier is immutable for the
/// lifetime of the account; only the password hash and profile image mutate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub async fn create(
        store: &dyn DocumentStore,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            photo_url: None,
            created_at: OffsetDateTime::now_utc(),
        };
        store
            .create(USERS, &user.id.to_string(), serde_json::to_value(&user)?)
            .await?;
        Ok(user)
    }

    /// Find a user by email. Emails are stored lowercased.
    pub async fn find_by_email(
        store: &dyn DocumentStore,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let doc = store.find_one(USERS, json!({ "email": email })).await?;
        doc.map(|d| serde_json::from_value(d.fields).map_err(StoreError::from))
            .transpose()
    }

    pub async fn find_by_id(
        store: &dyn DocumentStore,
        id: Uuid,
    ) -> Result<Option<User>, StoreError> {
        let fields = store.read(USERS, &id.to_string()).await?;
        fields
            .map(|f| serde_json::from_value(f).map_err(StoreError::from))
            .transpose()
    }

    pub async fn set_password_hash(
        store: &dyn DocumentStore,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        store
            .update(
                USERS,
                &id.to_string(),
                json!({ "password_hash": password_hash }),
            )
            .await
    }
}
