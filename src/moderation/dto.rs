use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::moderation::repo::{Content, ContentKind, ContentStatus};
use crate::moderation::services::Decision;

/// Request body for content submission.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub kind: ContentKind,
    pub title: String,
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub content_id: Uuid,
}

/// Request body for a moderation decision.
#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub decision: Decision,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub kind: ContentKind,
}

/// Content as returned to clients.
#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub id: Uuid,
    pub kind: ContentKind,
    pub owner_id: Uuid,
    pub title: String,
    pub body: Option<String>,
    pub status: ContentStatus,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

impl From<Content> for ContentResponse {
    fn from(c: Content) -> Self {
        Self {
            id: c.id,
            kind: c.kind,
            owner_id: c.owner_id,
            title: c.title,
            body: c.body,
            status: c.status,
            created_at: c.created_at,
        }
    }
}
