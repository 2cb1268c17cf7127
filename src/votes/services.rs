use serde_json::json;
use tracing::info;

use crate::auth::Identity;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::StoreError;
use crate::votes::repo::{tally_key, vote_key, Direction, Tally, TargetKind, Vote, TALLIES, VOTES};

/// Casting semantics: no prior vote inserts; the same direction toggles the
/// vote off; the opposite direction overwrites, swinging the signed total by
/// two. Each tally change is one atomic counter adjustment so concurrent
/// votes on the same target never lose updates.
pub async fn cast_vote(
    state: &AppState,
    voter: &Identity,
    target_id: &str,
    kind: TargetKind,
    direction: Direction,
) -> Result<Tally, ApiError> {
    let store = state.store.as_ref();
    let vkey = vote_key(kind, target_id, voter.id);
    let tkey = tally_key(kind, target_id);

    match Vote::find(store, &vkey).await? {
        None => {
            let vote = Vote {
                voter_id: voter.id,
                target_id: target_id.to_string(),
                target_kind: kind,
                direction,
            };
            match Vote::create(store, &vkey, &vote).await {
                Ok(()) => {
                    store.adjust(TALLIES, &tkey, &[(direction.field(), 1)]).await?;
                }
                // A concurrent cast from the same voter won; theirs counted.
                Err(StoreError::AlreadyExists { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Some(existing) if existing.direction == direction => {
            // Toggle off: only the request that actually removed the record
            // decrements.
            if store.remove(VOTES, &vkey).await? {
                store
                    .adjust(TALLIES, &tkey, &[(direction.field(), -1)])
                    .await?;
            }
        }
        Some(existing) => {
            // Overwrite guarded on the old direction; both counters move in
            // one adjustment, a net swing of two on the signed total.
            let overwrote = store
                .update_if(
                    VOTES,
                    &vkey,
                    "direction",
                    serde_json::to_value(existing.direction).map_err(StoreError::from)?,
                    json!({ "direction": direction }),
                )
                .await?;
            if overwrote {
                store
                    .adjust(
                        TALLIES,
                        &tkey,
                        &[(existing.direction.field(), -1), (direction.field(), 1)],
                    )
                    .await?;
            }
        }
    }

    info!(voter_id = %voter.id, target_id = %target_id, kind = ?kind, "vote cast");
    Ok(Tally::get(store, kind, target_id).await?)
}

pub async fn remove_vote(
    state: &AppState,
    voter: &Identity,
    target_id: &str,
    kind: TargetKind,
) -> Result<Tally, ApiError> {
    let store = state.store.as_ref();
    let vkey = vote_key(kind, target_id, voter.id);
    let tkey = tally_key(kind, target_id);

    if let Some(existing) = Vote::find(store, &vkey).await? {
        if store.remove(VOTES, &vkey).await? {
            store
                .adjust(TALLIES, &tkey, &[(existing.direction.field(), -1)])
                .await?;
        }
    }

    Ok(Tally::get(store, kind, target_id).await?)
}

pub async fn get_tally(
    state: &AppState,
    target_id: &str,
    kind: TargetKind,
) -> Result<Tally, ApiError> {
    Ok(Tally::get(state.store.as_ref(), kind, target_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn voter(email: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn first_vote_increments_the_counter() {
        let state = AppState::fake();
        let u = voter("u@example.com");
        let tally = cast_vote(&state, &u, "answer-1", TargetKind::Answer, Direction::Up)
            .await
            .unwrap();
        assert_eq!(tally, Tally { upvotes: 1, downvotes: 0 });
    }

    #[tokio::test]
    async fn same_direction_toggles_the_vote_off() {
        let state = AppState::fake();
        let u = voter("u@example.com");
        cast_vote(&state, &u, "answer-1", TargetKind::Answer, Direction::Up)
            .await
            .unwrap();
        let tally = cast_vote(&state, &u, "answer-1", TargetKind::Answer, Direction::Up)
            .await
            .unwrap();
        assert_eq!(tally, Tally { upvotes: 0, downvotes: 0 });
    }

    #[tokio::test]
    async fn opposite_direction_swings_the_total_by_two() {
        let state = AppState::fake();
        let u = voter("u@example.com");
        cast_vote(&state, &u, "answer-1", TargetKind::Answer, Direction::Up)
            .await
            .unwrap();
        let tally = cast_vote(&state, &u, "answer-1", TargetKind::Answer, Direction::Down)
            .await
            .unwrap();
        assert_eq!(tally, Tally { upvotes: 0, downvotes: 1 });
    }

    #[tokio::test]
    async fn votes_from_distinct_voters_accumulate() {
        let state = AppState::fake();
        let a = voter("a@example.com");
        let b = voter("b@example.com");
        cast_vote(&state, &a, "comment-9", TargetKind::Comment, Direction::Up)
            .await
            .unwrap();
        let tally = cast_vote(&state, &b, "comment-9", TargetKind::Comment, Direction::Up)
            .await
            .unwrap();
        assert_eq!(tally, Tally { upvotes: 2, downvotes: 0 });
    }

    #[tokio::test]
    async fn targets_are_partitioned_by_kind() {
        let state = AppState::fake();
        let u = voter("u@example.com");
        cast_vote(&state, &u, "id-1", TargetKind::Answer, Direction::Up)
            .await
            .unwrap();
        let comment_tally = get_tally(&state, "id-1", TargetKind::Comment).await.unwrap();
        assert_eq!(comment_tally, Tally::default());
    }

    #[tokio::test]
    async fn remove_vote_decrements_and_is_idempotent() {
        let state = AppState::fake();
        let u = voter("u@example.com");
        cast_vote(&state, &u, "answer-1", TargetKind::Answer, Direction::Down)
            .await
            .unwrap();

        let tally = remove_vote(&state, &u, "answer-1", TargetKind::Answer)
            .await
            .unwrap();
        assert_eq!(tally, Tally { upvotes: 0, downvotes: 0 });

        // No vote left to remove; the tally stays put.
        let tally = remove_vote(&state, &u, "answer-1", TargetKind::Answer)
            .await
            .unwrap();
        assert_eq!(tally, Tally { upvotes: 0, downvotes: 0 });
    }

    #[tokio::test]
    async fn tally_for_unvoted_target_is_zero() {
        let state = AppState::fake();
        let tally = get_tally(&state, "nothing", TargetKind::Answer).await.unwrap();
        assert_eq!(tally, Tally::default());
    }
}
