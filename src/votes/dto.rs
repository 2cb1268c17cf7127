use serde::Deserialize;

use crate::votes::repo::{Direction, TargetKind};

/// Request body for casting a vote.
#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub target_id: String,
    pub target_kind: TargetKind,
    pub direction: Direction,
}

/// Request body for removing a vote.
#[derive(Debug, Deserialize)]
pub struct RemoveVoteRequest {
    pub target_id: String,
    pub target_kind: TargetKind,
}
