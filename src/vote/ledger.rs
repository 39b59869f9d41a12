//! The toggle rule on an in-memory voter list. Stores that cannot express
//! the rule as a single server-side update apply it under their own lock.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

use crate::vote::model::{Votable, VoteTally, VoteType, Voter};

/// Applies one vote and returns the caller's resulting vote.
///
/// * no record: the vote is added
/// * same type: the vote is retracted
/// * other type: the record is switched in place, keeping its position
pub fn apply_toggle(
    voters: &mut Vec<Voter>,
    user_id: ObjectId,
    vote_type: VoteType,
    at: DateTime<Utc>,
) -> Option<VoteType> {
    match voters.iter().position(|v| v.user_id == user_id) {
        None => {
            voters.push(Voter {
                user_id,
                vote_type,
                voted_at: at,
            });
            Some(vote_type)
        }
        Some(index) if voters[index].vote_type == vote_type => {
            voters.remove(index);
            None
        }
        Some(index) => {
            let existing = &mut voters[index];
            existing.vote_type = vote_type;
            existing.voted_at = at;
            Some(vote_type)
        }
    }
}

/// (upvotes, downvotes) derived from the voter set.
pub fn tally(voters: &[Voter]) -> (i64, i64) {
    voters.iter().fold((0, 0), |(up, down), v| match v.vote_type {
        VoteType::Up => (up + 1, down),
        VoteType::Down => (up, down + 1),
    })
}

/// Toggle on a votable entity, re-deriving both counters from the result.
pub fn toggle_entity<V: Votable>(
    entity_id: ObjectId,
    entity: &mut V,
    user_id: ObjectId,
    vote_type: VoteType,
    at: DateTime<Utc>,
) -> VoteTally {
    apply_toggle(entity.voters_mut(), user_id, vote_type, at);
    let (upvotes, downvotes) = tally(entity.voters());
    entity.set_tally(upvotes, downvotes);
    VoteTally::from_entity(entity_id, entity, upvotes, downvotes)
}
