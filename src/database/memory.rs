use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use crate::comment::model::Comment;
use crate::community::model::{Community, CommunityChanges, Membership, Role, Rule};
use crate::database::store::ForumStore;
use crate::post::model::{Post, PostChanges};
use crate::utils::error::ForumError;
use crate::utils::validation::DELETED_MARKER;
use crate::vote::ledger::toggle_entity;
use crate::vote::model::{VoteTally, VoteTarget, VoteType};

#[derive(Default)]
struct State {
    communities: HashMap<ObjectId, Community>,
    memberships: HashMap<(ObjectId, ObjectId), Membership>,
    posts: HashMap<ObjectId, Post>,
    comments: HashMap<ObjectId, Comment>,
}

/// Process-local store. Every method runs under one lock, which plays the
/// part of the database's per-document atomicity.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    #[cfg(test)]
    faults: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Makes the next `count` vote toggles or counter writes fail with
    /// `Unavailable`, the way a flaky database would.
    pub fn inject_unavailable(&self, count: u32) {
        self.faults.store(count, Ordering::SeqCst);
    }

    fn take_fault(&self) -> Result<(), ForumError> {
        let tripped = self
            .faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if tripped {
            Err(ForumError::unavailable("Injected store failure"))
        } else {
            Ok(())
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[async_trait]
impl ForumStore for MemoryStore {
    async fn insert_community(&self, community: &Community) -> Result<(), ForumError> {
        let mut state = self.state.write().await;
        if state.communities.values().any(|c| c.name == community.name) {
            return Err(ForumError::Conflict(
                "Community name already exists".to_string(),
            ));
        }
        state.communities.insert(community.id, community.clone());
        Ok(())
    }

    async fn find_community(&self, id: &ObjectId) -> Result<Option<Community>, ForumError> {
        Ok(self.state.read().await.communities.get(id).cloned())
    }

    async fn list_communities(&self) -> Result<Vec<Community>, ForumError> {
        let state = self.state.read().await;
        let mut communities: Vec<Community> = state.communities.values().cloned().collect();
        communities.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(communities)
    }

    async fn search_communities(&self, query: &str) -> Result<Vec<Community>, ForumError> {
        let needle = query.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .communities
            .values()
            .filter(|c| {
                contains_ci(&c.name, &needle)
                    || contains_ci(&c.description, &needle)
                    || c.tags.iter().any(|t| contains_ci(t, &needle))
            })
            .cloned()
            .collect())
    }

    async fn update_community(
        &self,
        id: &ObjectId,
        changes: &CommunityChanges,
    ) -> Result<Option<Community>, ForumError> {
        let mut state = self.state.write().await;
        let Some(community) = state.communities.get_mut(id) else {
            return Ok(None);
        };
        if let Some(description) = &changes.description {
            community.description = description.clone();
        }
        if let Some(category) = changes.category {
            community.category = category;
        }
        if let Some(tags) = &changes.tags {
            community.tags = tags.clone();
        }
        if let Some(privacy) = changes.privacy {
            community.privacy = privacy;
        }
        if let Some(banner) = &changes.banner_image {
            community.banner_image = Some(banner.clone());
        }
        if let Some(icon) = &changes.icon {
            community.icon = Some(icon.clone());
        }
        community.updated_at = Utc::now();
        Ok(Some(community.clone()))
    }

    async fn push_rule(&self, id: &ObjectId, rule: &Rule) -> Result<Option<Community>, ForumError> {
        let mut state = self.state.write().await;
        Ok(state.communities.get_mut(id).map(|community| {
            community.rules.push(rule.clone());
            community.updated_at = Utc::now();
            community.clone()
        }))
    }

    async fn delete_community(&self, id: &ObjectId) -> Result<bool, ForumError> {
        Ok(self.state.write().await.communities.remove(id).is_some())
    }

    async fn community_ids(&self) -> Result<Vec<ObjectId>, ForumError> {
        Ok(self.state.read().await.communities.keys().copied().collect())
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<bool, ForumError> {
        let mut state = self.state.write().await;
        let key = (membership.community_id, membership.user_id);
        if state.memberships.contains_key(&key) {
            return Ok(false);
        }
        state.memberships.insert(key, membership.clone());
        Ok(true)
    }

    async fn find_membership(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<Membership>, ForumError> {
        let state = self.state.read().await;
        Ok(state.memberships.get(&(*community_id, *user_id)).cloned())
    }

    async fn transition_membership(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
        from: Role,
        to: Role,
    ) -> Result<bool, ForumError> {
        let mut state = self.state.write().await;
        match state.memberships.get_mut(&(*community_id, *user_id)) {
            Some(membership) if membership.role == from => {
                membership.role = to;
                membership.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove_membership(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
        roles: &[Role],
    ) -> Result<bool, ForumError> {
        let mut state = self.state.write().await;
        let key = (*community_id, *user_id);
        match state.memberships.get(&key) {
            Some(membership) if roles.contains(&membership.role) => {
                state.memberships.remove(&key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_members(&self, community_id: &ObjectId) -> Result<u64, ForumError> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .values()
            .filter(|m| m.community_id == *community_id && m.role.is_member())
            .count() as u64)
    }

    async fn list_memberships(&self, community_id: &ObjectId) -> Result<Vec<Membership>, ForumError> {
        let state = self.state.read().await;
        let mut rows: Vec<Membership> = state
            .memberships
            .values()
            .filter(|m| m.community_id == *community_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn delete_memberships(&self, community_id: &ObjectId) -> Result<u64, ForumError> {
        let mut state = self.state.write().await;
        let before = state.memberships.len();
        state.memberships.retain(|(community, _), _| community != community_id);
        Ok((before - state.memberships.len()) as u64)
    }

    async fn insert_post(&self, post: &Post) -> Result<(), ForumError> {
        self.state.write().await.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn find_post(&self, id: &ObjectId) -> Result<Option<Post>, ForumError> {
        Ok(self.state.read().await.posts.get(id).cloned())
    }

    async fn record_post_view(&self, id: &ObjectId) -> Result<Option<Post>, ForumError> {
        let mut state = self.state.write().await;
        Ok(state.posts.get_mut(id).map(|post| {
            post.view_count += 1;
            post.last_activity = Utc::now();
            post.clone()
        }))
    }

    async fn update_post(
        &self,
        id: &ObjectId,
        changes: &PostChanges,
        at: DateTime<Utc>,
    ) -> Result<Option<Post>, ForumError> {
        let mut state = self.state.write().await;
        let Some(post) = state.posts.get_mut(id).filter(|p| !p.is_deleted) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            post.title = title.clone();
        }
        if let Some(content) = &changes.content {
            post.content = content.clone();
        }
        if let Some(tags) = &changes.tags {
            post.tags = tags.clone();
        }
        post.is_edited = true;
        post.edited_at = Some(at);
        post.updated_at = at;
        post.last_activity = at;
        Ok(Some(post.clone()))
    }

    async fn soft_delete_post(&self, id: &ObjectId, at: DateTime<Utc>) -> Result<bool, ForumError> {
        let mut state = self.state.write().await;
        match state.posts.get_mut(id) {
            Some(post) if !post.is_deleted => {
                post.is_deleted = true;
                post.content = DELETED_MARKER.to_string();
                post.media.clear();
                post.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove_unreferenced_post(&self, id: &ObjectId) -> Result<bool, ForumError> {
        let mut state = self.state.write().await;
        let referenced = state.comments.values().any(|c| c.post_id == *id);
        match state.posts.get(id) {
            Some(post) if post.is_deleted && post.voters.is_empty() && !referenced => {
                state.posts.remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_posts(&self, community_id: &ObjectId) -> Result<Vec<Post>, ForumError> {
        let state = self.state.read().await;
        let mut posts: Vec<Post> = state
            .posts
            .values()
            .filter(|p| p.community_id == *community_id && !p.is_deleted)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    async fn post_ids(&self) -> Result<Vec<ObjectId>, ForumError> {
        Ok(self.state.read().await.posts.keys().copied().collect())
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), ForumError> {
        self.state
            .write()
            .await
            .comments
            .insert(comment.id, comment.clone());
        Ok(())
    }

    async fn find_comment(&self, id: &ObjectId) -> Result<Option<Comment>, ForumError> {
        Ok(self.state.read().await.comments.get(id).cloned())
    }

    async fn remove_comment(&self, id: &ObjectId) -> Result<bool, ForumError> {
        Ok(self.state.write().await.comments.remove(id).is_some())
    }

    async fn update_comment_content(
        &self,
        id: &ObjectId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Comment>, ForumError> {
        let mut state = self.state.write().await;
        Ok(state
            .comments
            .get_mut(id)
            .filter(|c| !c.is_deleted)
            .map(|comment| {
                comment.content = content.to_string();
                comment.is_edited = true;
                comment.edited_at = Some(at);
                comment.updated_at = at;
                comment.clone()
            }))
    }

    async fn soft_delete_comment(&self, id: &ObjectId, at: DateTime<Utc>) -> Result<bool, ForumError> {
        let mut state = self.state.write().await;
        match state.comments.get_mut(id) {
            Some(comment) if !comment.is_deleted => {
                comment.is_deleted = true;
                comment.content = DELETED_MARKER.to_string();
                comment.media.clear();
                comment.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_comments(
        &self,
        post_id: &ObjectId,
        parent: Option<&ObjectId>,
    ) -> Result<Vec<Comment>, ForumError> {
        let state = self.state.read().await;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.post_id == *post_id && c.parent_comment.as_ref() == parent)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn count_live_comments(&self, post_id: &ObjectId) -> Result<u64, ForumError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .values()
            .filter(|c| c.post_id == *post_id && !c.is_deleted)
            .count() as u64)
    }

    async fn has_comments(&self, post_id: &ObjectId) -> Result<bool, ForumError> {
        let state = self.state.read().await;
        Ok(state.comments.values().any(|c| c.post_id == *post_id))
    }

    async fn toggle_vote(
        &self,
        target: VoteTarget,
        entity_id: &ObjectId,
        user_id: &ObjectId,
        vote_type: VoteType,
        at: DateTime<Utc>,
    ) -> Result<Option<VoteTally>, ForumError> {
        #[cfg(test)]
        self.take_fault()?;
        let mut state = self.state.write().await;
        let tally = match target {
            VoteTarget::Post => state
                .posts
                .get_mut(entity_id)
                .filter(|p| !p.is_deleted)
                .map(|post| toggle_entity(*entity_id, post, *user_id, vote_type, at)),
            VoteTarget::Comment => state
                .comments
                .get_mut(entity_id)
                .filter(|c| !c.is_deleted)
                .map(|comment| toggle_entity(*entity_id, comment, *user_id, vote_type, at)),
        };
        Ok(tally)
    }

    async fn increment_comment_count(&self, post_id: &ObjectId, delta: i64) -> Result<(), ForumError> {
        #[cfg(test)]
        self.take_fault()?;
        if let Some(post) = self.state.write().await.posts.get_mut(post_id) {
            post.comment_count += delta;
        }
        Ok(())
    }

    async fn set_comment_count(
        &self,
        post_id: &ObjectId,
        expected: i64,
        value: i64,
    ) -> Result<bool, ForumError> {
        let mut state = self.state.write().await;
        match state.posts.get_mut(post_id) {
            Some(post) if post.comment_count == expected => {
                post.comment_count = value;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment_member_count(&self, community_id: &ObjectId, delta: i64) -> Result<(), ForumError> {
        #[cfg(test)]
        self.take_fault()?;
        if let Some(community) = self.state.write().await.communities.get_mut(community_id) {
            community.member_count += delta;
        }
        Ok(())
    }

    async fn set_member_count(
        &self,
        community_id: &ObjectId,
        expected: i64,
        value: i64,
    ) -> Result<bool, ForumError> {
        let mut state = self.state.write().await;
        match state.communities.get_mut(community_id) {
            Some(community) if community.member_count == expected => {
                community.member_count = value;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::community::model::{Category, Privacy};
    use crate::media::{MediaKind, MediaRef};

    fn community(name: &str, creator: ObjectId) -> Community {
        let now = Utc::now();
        Community {
            id: ObjectId::new(),
            name: name.into(),
            description: "desc".into(),
            category: Category::Other,
            tags: vec!["rust".into()],
            privacy: Privacy::Public,
            creator_id: creator,
            member_count: 1,
            banner_image: None,
            icon: None,
            rules: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[actix_web::test]
    async fn membership_rows_are_unique_per_pair() {
        let store = MemoryStore::new();
        let (c, u) = (ObjectId::new(), ObjectId::new());

        assert!(store.insert_membership(&Membership::new(c, u, Role::Pending)).await.unwrap());
        assert!(!store.insert_membership(&Membership::new(c, u, Role::Member)).await.unwrap());
        assert_eq!(
            store.find_membership(&c, &u).await.unwrap().unwrap().role,
            Role::Pending
        );
        assert_eq!(store.count_members(&c).await.unwrap(), 0);
    }

    #[actix_web::test]
    async fn transitions_are_conditional() {
        let store = MemoryStore::new();
        let (c, u) = (ObjectId::new(), ObjectId::new());
        store.insert_membership(&Membership::new(c, u, Role::Pending)).await.unwrap();

        assert!(store.transition_membership(&c, &u, Role::Pending, Role::Member).await.unwrap());
        assert!(!store.transition_membership(&c, &u, Role::Pending, Role::Member).await.unwrap());
        assert!(!store.remove_membership(&c, &u, &[Role::Pending]).await.unwrap());
        assert!(store.remove_membership(&c, &u, &[Role::Member, Role::Moderator]).await.unwrap());
        assert!(store.find_membership(&c, &u).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn duplicate_names_conflict_and_search_ignores_case() {
        let store = MemoryStore::new();
        let creator = ObjectId::new();
        store.insert_community(&community("Rustaceans", creator)).await.unwrap();

        let err = store
            .insert_community(&community("Rustaceans", creator))
            .await
            .unwrap_err();
        assert!(matches!(err, ForumError::Conflict(_)));

        assert_eq!(store.search_communities("rustACE").await.unwrap().len(), 1);
        assert_eq!(store.search_communities("RUST").await.unwrap().len(), 1);
        assert!(store.search_communities("gardening").await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn injected_faults_are_consumed() {
        let store = MemoryStore::new();
        store.inject_unavailable(1);
        let post = ObjectId::new();

        assert!(store.increment_comment_count(&post, 1).await.is_err());
        assert!(store.increment_comment_count(&post, 1).await.is_ok());
    }

    fn post(author: ObjectId) -> Post {
        Post::new(
            author,
            ObjectId::new(),
            "title".into(),
            "body".into(),
            Vec::new(),
            Vec::new(),
        )
    }

    #[actix_web::test]
    async fn removal_skips_posts_that_gained_a_vote_or_reply() {
        let store = MemoryStore::new();
        let author = ObjectId::new();

        let voted = post(author);
        store.insert_post(&voted).await.unwrap();
        store
            .toggle_vote(VoteTarget::Post, &voted.id, &author, VoteType::Up, Utc::now())
            .await
            .unwrap();
        store.soft_delete_post(&voted.id, Utc::now()).await.unwrap();
        assert!(!store.remove_unreferenced_post(&voted.id).await.unwrap());
        assert_eq!(store.find_post(&voted.id).await.unwrap().unwrap().voters.len(), 1);

        let replied = post(author);
        store.insert_post(&replied).await.unwrap();
        store
            .insert_comment(&Comment::new(replied.id, author, None, "hi".into(), Vec::new()))
            .await
            .unwrap();
        store.soft_delete_post(&replied.id, Utc::now()).await.unwrap();
        assert!(!store.remove_unreferenced_post(&replied.id).await.unwrap());

        // Live posts are never removed outright.
        let live = post(author);
        store.insert_post(&live).await.unwrap();
        assert!(!store.remove_unreferenced_post(&live.id).await.unwrap());
        store.soft_delete_post(&live.id, Utc::now()).await.unwrap();
        assert!(store.remove_unreferenced_post(&live.id).await.unwrap());
        assert!(store.find_post(&live.id).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn soft_deleted_comments_drop_their_media() {
        let store = MemoryStore::new();
        let media = vec![MediaRef {
            external_id: "forum/abc".into(),
            url: "https://cdn.example/abc.png".into(),
            kind: MediaKind::Image,
        }];
        let comment = Comment::new(ObjectId::new(), ObjectId::new(), None, "pic".into(), media);
        store.insert_comment(&comment).await.unwrap();

        assert!(store.soft_delete_comment(&comment.id, Utc::now()).await.unwrap());
        let stored = store.find_comment(&comment.id).await.unwrap().unwrap();
        assert!(stored.media.is_empty());
        assert_eq!(stored.content, DELETED_MARKER);
    }

    #[actix_web::test]
    async fn counter_repairs_only_apply_to_the_value_read() {
        let store = MemoryStore::new();
        let p = post(ObjectId::new());
        store.insert_post(&p).await.unwrap();

        store.increment_comment_count(&p.id, 1).await.unwrap();
        assert!(!store.set_comment_count(&p.id, 0, 5).await.unwrap());
        assert_eq!(store.find_post(&p.id).await.unwrap().unwrap().comment_count, 1);
        assert!(store.set_comment_count(&p.id, 1, 5).await.unwrap());
        assert_eq!(store.find_post(&p.id).await.unwrap().unwrap().comment_count, 5);

        let c = community("Counters", ObjectId::new());
        store.insert_community(&c).await.unwrap();
        assert!(!store.set_member_count(&c.id, 3, 0).await.unwrap());
        assert!(store.set_member_count(&c.id, 1, 0).await.unwrap());
    }
}
