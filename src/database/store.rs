use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

use crate::comment::model::Comment;
use crate::community::model::{Community, CommunityChanges, Membership, Role, Rule};
use crate::post::model::{Post, PostChanges};
use crate::utils::error::ForumError;
use crate::vote::model::{VoteTally, VoteTarget, VoteType};

/// Persistence contract of the forum.
///
/// Voter sets, membership rows and counters are mutated only through these
/// methods, and every mutating method is a single atomic, conditional update
/// scoped to one entity: callers never read-modify-write.
#[async_trait]
pub trait ForumStore: Send + Sync {
    // Communities

    /// Fails with `Conflict` when the name is taken.
    async fn insert_community(&self, community: &Community) -> Result<(), ForumError>;
    async fn find_community(&self, id: &ObjectId) -> Result<Option<Community>, ForumError>;
    async fn list_communities(&self) -> Result<Vec<Community>, ForumError>;
    /// Case-insensitive substring match on name, description and tags.
    async fn search_communities(&self, query: &str) -> Result<Vec<Community>, ForumError>;
    async fn update_community(
        &self,
        id: &ObjectId,
        changes: &CommunityChanges,
    ) -> Result<Option<Community>, ForumError>;
    async fn push_rule(&self, id: &ObjectId, rule: &Rule) -> Result<Option<Community>, ForumError>;
    async fn delete_community(&self, id: &ObjectId) -> Result<bool, ForumError>;
    async fn community_ids(&self) -> Result<Vec<ObjectId>, ForumError>;

    // Memberships

    /// Idempotent: returns `false` when a row for the pair already exists.
    async fn insert_membership(&self, membership: &Membership) -> Result<bool, ForumError>;
    async fn find_membership(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<Membership>, ForumError>;
    /// Moves the pair from `from` to `to`; `false` if it was not in `from`.
    async fn transition_membership(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
        from: Role,
        to: Role,
    ) -> Result<bool, ForumError>;
    /// Removes the pair if its role is one of `roles`.
    async fn remove_membership(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
        roles: &[Role],
    ) -> Result<bool, ForumError>;
    /// Rows with role member or moderator.
    async fn count_members(&self, community_id: &ObjectId) -> Result<u64, ForumError>;
    async fn list_memberships(&self, community_id: &ObjectId) -> Result<Vec<Membership>, ForumError>;
    async fn delete_memberships(&self, community_id: &ObjectId) -> Result<u64, ForumError>;

    // Posts

    async fn insert_post(&self, post: &Post) -> Result<(), ForumError>;
    async fn find_post(&self, id: &ObjectId) -> Result<Option<Post>, ForumError>;
    /// Increments the view counter and returns the post.
    async fn record_post_view(&self, id: &ObjectId) -> Result<Option<Post>, ForumError>;
    async fn update_post(
        &self,
        id: &ObjectId,
        changes: &PostChanges,
        at: DateTime<Utc>,
    ) -> Result<Option<Post>, ForumError>;
    /// Replaces the content with the deletion marker and drops media refs.
    async fn soft_delete_post(&self, id: &ObjectId, at: DateTime<Utc>) -> Result<bool, ForumError>;
    /// Physically removes a post that is already flagged deleted and still
    /// has no voters. `false` leaves the soft-deleted document in place.
    async fn remove_unreferenced_post(&self, id: &ObjectId) -> Result<bool, ForumError>;
    /// Non-deleted posts of a community, newest first.
    async fn list_posts(&self, community_id: &ObjectId) -> Result<Vec<Post>, ForumError>;
    async fn post_ids(&self) -> Result<Vec<ObjectId>, ForumError>;

    // Comments

    async fn insert_comment(&self, comment: &Comment) -> Result<(), ForumError>;
    async fn find_comment(&self, id: &ObjectId) -> Result<Option<Comment>, ForumError>;
    /// Only applies to comments that are not deleted.
    async fn update_comment_content(
        &self,
        id: &ObjectId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Comment>, ForumError>;
    /// Undoes an insert whose post was deleted before the comment landed.
    async fn remove_comment(&self, id: &ObjectId) -> Result<bool, ForumError>;
    /// `true` only for the call that actually flipped `is_deleted`. Media
    /// refs are dropped with the content.
    async fn soft_delete_comment(&self, id: &ObjectId, at: DateTime<Utc>) -> Result<bool, ForumError>;
    /// Comments of a post with the given parent (`None` for top level).
    async fn list_comments(
        &self,
        post_id: &ObjectId,
        parent: Option<&ObjectId>,
    ) -> Result<Vec<Comment>, ForumError>;
    async fn count_live_comments(&self, post_id: &ObjectId) -> Result<u64, ForumError>;
    /// Whether any comment, deleted or not, references the post.
    async fn has_comments(&self, post_id: &ObjectId) -> Result<bool, ForumError>;

    // Votes

    /// Atomic toggle keyed by `(entity_id, user_id)`; the same update
    /// re-derives both counters. `None` when the entity is missing or deleted.
    async fn toggle_vote(
        &self,
        target: VoteTarget,
        entity_id: &ObjectId,
        user_id: &ObjectId,
        vote_type: VoteType,
        at: DateTime<Utc>,
    ) -> Result<Option<VoteTally>, ForumError>;

    // Counters

    async fn increment_comment_count(&self, post_id: &ObjectId, delta: i64) -> Result<(), ForumError>;
    /// Compare-and-set: writes `value` only while the counter still holds
    /// `expected`. `false` means a concurrent delta got there first.
    async fn set_comment_count(
        &self,
        post_id: &ObjectId,
        expected: i64,
        value: i64,
    ) -> Result<bool, ForumError>;
    async fn increment_member_count(&self, community_id: &ObjectId, delta: i64) -> Result<(), ForumError>;
    /// Compare-and-set, as [`ForumStore::set_comment_count`].
    async fn set_member_count(
        &self,
        community_id: &ObjectId,
        expected: i64,
        value: i64,
    ) -> Result<bool, ForumError>;
}
