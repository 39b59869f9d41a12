use std::sync::Arc;

use chrono::Utc;
use mongodb::bson::oid::ObjectId;

use crate::database::ForumStore;
use crate::realtime::model::{ForumEvent, Topic};
use crate::realtime::notifier::Notifier;
use crate::utils::error::ForumError;
use crate::utils::retry::retry_once;
use crate::vote::model::{VoteOutcome, VoteTarget, VoteType};

pub struct VoteService {
    store: Arc<dyn ForumStore>,
    notifier: Arc<dyn Notifier>,
}

impl VoteService {
    pub fn new(store: Arc<dyn ForumStore>, notifier: Arc<dyn Notifier>) -> Self {
        VoteService { store, notifier }
    }

    /// Toggles the caller's vote on a post or comment.
    ///
    /// Voting again with the same type retracts the vote; voting with the
    /// other type switches it. Counters in the outcome are the ones the
    /// store derived from the voter set in the same write.
    pub async fn vote(
        &self,
        target: VoteTarget,
        entity_id: &ObjectId,
        user_id: &ObjectId,
        raw_vote: &str,
    ) -> Result<VoteOutcome, ForumError> {
        let vote_type: VoteType = raw_vote.parse()?;
        let at = Utc::now();
        let store = &self.store;

        let tally = retry_once("vote toggle", || async move {
            store.toggle_vote(target, entity_id, user_id, vote_type, at).await
        })
        .await?
        .ok_or_else(|| ForumError::NotFound(format!("{} not found", target)))?;

        let user_vote = tally.vote_of(user_id);
        log::debug!(
            "{} {} by {}: {:?} (up {}, down {})",
            target,
            entity_id,
            user_id,
            user_vote,
            tally.upvotes,
            tally.downvotes
        );

        self.notifier.publish(
            &Topic::Post(tally.post_id),
            &ForumEvent::VoteChanged {
                entity_id: entity_id.to_hex(),
                entity_kind: target,
                upvotes: tally.upvotes,
                downvotes: tally.downvotes,
                caller_vote: user_vote,
            },
        );

        Ok(VoteOutcome {
            entity_id: *entity_id,
            target,
            upvotes: tally.upvotes,
            downvotes: tally.downvotes,
            user_vote,
        })
    }
}
