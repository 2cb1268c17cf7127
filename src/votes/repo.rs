use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{DocumentStore, StoreError};

pub const VOTES: &str = "votes";
pub const TALLIES: &str = "tallies";

/// What a vote can target. Answers and comments live inside content payloads,
/// so targets are addressed by opaque id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Answer,
    Comment,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Answer => "answer",
            TargetKind::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Tally counter this direction feeds.
    pub fn field(&self) -> &'static str {
        match self {
            Direction::Up => "upvotes",
            Direction::Down => "downvotes",
        }
    }
}

/// At most one vote per (voter, target): the document id is derived from the
/// pair, so the store enforces the uniqueness.
pub fn vote_key(kind: TargetKind, target_id: &str, voter_id: Uuid) -> String {
    format!("{}:{}:{}", kind.as_str(), target_id, voter_id)
}

pub fn tally_key(kind: TargetKind, target_id: &str) -> String {
    format!("{}:{}", kind.as_str(), target_id)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: Uuid,
    pub target_id: String,
    pub target_kind: TargetKind,
    pub direction: Direction,
}

impl Vote {
    pub async fn find(
        store: &dyn DocumentStore,
        key: &str,
    ) -> Result<Option<Vote>, StoreError> {
        let fields = store.read(VOTES, key).await?;
        fields
            .map(|f| serde_json::from_value(f).map_err(StoreError::from))
            .transpose()
    }

    pub async fn create(store: &dyn DocumentStore, key: &str, vote: &Vote) -> Result<(), StoreError> {
        store.create(VOTES, key, serde_json::to_value(vote)?).await
    }
}

/// Derived aggregate kept equal to the grouped count of vote records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
}

impl Tally {
    pub async fn get(
        store: &dyn DocumentStore,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<Tally, StoreError> {
        let fields = store.read(TALLIES, &tally_key(kind, target_id)).await?;
        fields
            .map(|f| serde_json::from_value(f).map_err(StoreError::from))
            .transpose()
            .map(|t| t.unwrap_or_default())
    }
}
