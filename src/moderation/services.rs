use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::access;
use crate::auth::Identity;
use crate::error::ApiError;
use crate::moderation::repo::{Content, ContentKind, ContentStatus};
use crate::state::AppState;

/// Decision on pending content. Re-deciding already-decided content is
/// permitted and overwrites, so moderators can reverse themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for ContentStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Approved => ContentStatus::Approved,
            Decision::Rejected => ContentStatus::Rejected,
        }
    }
}

/// Three-tier visibility, shared by all content kinds: administrators see
/// everything, an authenticated viewer sees approved items plus their own,
/// an anonymous viewer sees only approved items.
pub fn visible_to(
    viewer: Option<&Identity>,
    viewer_is_admin: bool,
) -> impl Fn(&Content) -> bool + '_ {
    move |content| {
        if viewer_is_admin {
            return true;
        }
        match viewer {
            Some(v) => content.status == ContentStatus::Approved || content.owner_id == v.id,
            None => content.status == ContentStatus::Approved,
        }
    }
}

pub async fn submit(
    state: &AppState,
    owner: &Identity,
    kind: ContentKind,
    title: &str,
    body: Option<String>,
) -> Result<Content, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("Title is required".into()));
    }
    let content = Content::create(state.store.as_ref(), owner.id, kind, title, body).await?;
    info!(content_id = %content.id, owner_id = %owner.id, kind = ?kind, "content submitted");
    Ok(content)
}

pub async fn decide(
    state: &AppState,
    moderator: &Identity,
    content_id: Uuid,
    decision: Decision,
) -> Result<Content, ApiError> {
    if !state.access.is_admin(&moderator.email) {
        return Err(ApiError::Forbidden);
    }

    let store = state.store.as_ref();
    if Content::find(store, content_id).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    let now = OffsetDateTime::now_utc();
    if !Content::set_decision(store, content_id, decision.into(), moderator.id, now).await? {
        return Err(ApiError::NotFound);
    }

    info!(content_id = %content_id, moderator_id = %moderator.id, decision = ?decision, "content decided");
    Content::find(store, content_id)
        .await?
        .ok_or(ApiError::NotFound)
}

pub async fn list(
    state: &AppState,
    kind: ContentKind,
    viewer: Option<&Identity>,
) -> Result<Vec<Content>, ApiError> {
    let viewer_is_admin = viewer
        .map(|v| state.access.is_admin(&v.email))
        .unwrap_or(false);
    let all = Content::list_by_kind(state.store.as_ref(), kind).await?;
    let predicate = visible_to(viewer, viewer_is_admin);
    Ok(all.into_iter().filter(|c| predicate(c)).collect())
}

pub async fn delete(
    state: &AppState,
    requester: &Identity,
    content_id: Uuid,
) -> Result<(), ApiError> {
    let store = state.store.as_ref();
    let content = Content::find(store, content_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let allowed = state.access.is_admin(&requester.email)
        || access::is_owner(requester.id, content.owner_id);
    if !allowed {
        return Err(ApiError::Forbidden);
    }

    if !Content::remove(store, content_id).await? {
        return Err(ApiError::NotFound);
    }
    info!(content_id = %content_id, requester_id = %requester.id, "content deleted");
    Ok(())
}
