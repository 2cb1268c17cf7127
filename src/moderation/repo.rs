use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::{DocumentStore, StoreError};

pub const CONTENT: &str = "content";

/// The three moderatable content kinds share one lifecycle and one record
/// shape; the kind only partitions listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Subject,
    Video,
    ReferenceLink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: Uuid,
    pub kind: ContentKind,
    pub owner_id: Uuid,
    pub title: String,
    /// Opaque payload pointer: URL, file reference, description.
    #[serde(default)]
    pub body: Option<String>,
    pub status: ContentStatus,
    #[serde(default)]
    pub moderated_by: Option<Uuid>,
    #[serde(default, with = "time::serde::timestamp::option")]
    pub decided_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

impl Content {
    /// Every kind starts pending; visibility comes only from moderation.
    pub async fn create(
        store: &dyn DocumentStore,
        owner_id: Uuid,
        kind: ContentKind,
        title: &str,
        body: Option<String>,
    ) -> Result<Content, StoreError> {
        let content = Content {
            id: Uuid::new_v4(),
            kind,
            owner_id,
            title: title.to_string(),
            body,
            status: ContentStatus::Pending,
            moderated_by: None,
            decided_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        store
            .create(
                CONTENT,
                &content.id.to_string(),
                serde_json::to_value(&content)?,
            )
            .await?;
        Ok(content)
    }

    pub async fn find(store: &dyn DocumentStore, id: Uuid) -> Result<Option<Content>, StoreError> {
        let fields = store.read(CONTENT, &id.to_string()).await?;
        fields
            .map(|f| serde_json::from_value(f).map_err(StoreError::from))
            .transpose()
    }

    pub async fn list_by_kind(
        store: &dyn DocumentStore,
        kind: ContentKind,
    ) -> Result<Vec<Content>, StoreError> {
        let docs = store
            .find_many(CONTENT, json!({ "kind": kind }))
            .await?;
        docs.into_iter()
            .map(|d| serde_json::from_value(d.fields).map_err(StoreError::from))
            .collect()
    }

    pub async fn set_decision(
        store: &dyn DocumentStore,
        id: Uuid,
        status: ContentStatus,
        moderator_id: Uuid,
        decided_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        store
            .update(
                CONTENT,
                &id.to_string(),
                json!({
                    "status": status,
                    "moderated_by": moderator_id,
                    "decided_at": decided_at.unix_timestamp(),
                }),
            )
            .await
    }

    pub async fn remove(store: &dyn DocumentStore, id: Uuid) -> Result<bool, StoreError> {
        store.remove(CONTENT, &id.to_string()).await
    }
}
