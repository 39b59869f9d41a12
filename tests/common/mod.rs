#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use mongodb::bson::oid::ObjectId;

use forum_backend::comment::model::{Comment, CreateCommentRequest};
use forum_backend::comment::service::CommentService;
use forum_backend::community::model::{
    Category, Community, CommunityChanges, CreateCommunityRequest, Membership, Privacy, Role, Rule,
};
use forum_backend::community::service::CommunityService;
use forum_backend::counters::CounterProjector;
use forum_backend::database::{ForumStore, MemoryStore};
use forum_backend::media::DisabledMedia;
use forum_backend::post::model::{CreatePostRequest, Post, PostChanges};
use forum_backend::post::service::PostService;
use forum_backend::realtime::InMemoryBus;
use forum_backend::utils::error::ForumError;
use forum_backend::vote::model::{VoteTally, VoteTarget, VoteType};
use forum_backend::vote::service::VoteService;

type Hook = Box<dyn FnOnce(Arc<MemoryStore>) -> BoxFuture<'static, ()> + Send>;

/// A `MemoryStore` that can run a write of its own right after a named call
/// returns, and fail the next vote toggles or counter writes on demand.
#[derive(Default)]
pub struct ScriptedStore {
    inner: Arc<MemoryStore>,
    hooks: Mutex<HashMap<&'static str, Hook>>,
    faults: AtomicU32,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The unscripted store, for writes that must not trigger hooks.
    pub fn inner(&self) -> Arc<MemoryStore> {
        self.inner.clone()
    }

    /// Runs `hook` once, after the next call to `method` completes and before
    /// its result reaches the caller.
    pub fn after<F, Fut>(&self, method: &'static str, hook: F)
    where
        F: FnOnce(Arc<MemoryStore>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let hook: Hook = Box::new(move |store| Box::pin(hook(store)));
        self.hooks.lock().unwrap().insert(method, hook);
    }

    /// Makes the next `count` vote toggles or counter increments fail with
    /// a retryable `Unavailable`.
    pub fn fail_next(&self, count: u32) {
        self.faults.store(count, Ordering::SeqCst);
    }

    async fn fire(&self, method: &'static str) {
        let hook = self.hooks.lock().unwrap().remove(method);
        if let Some(hook) = hook {
            hook(self.inner.clone()).await;
        }
    }

    fn take_fault(&self) -> Result<(), ForumError> {
        match self
            .faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        {
            Ok(_) => Err(ForumError::unavailable("Scripted store failure")),
            Err(_) => Ok(()),
        }
    }
}

macro_rules! scripted {
    ($self:ident, $method:literal, $call:expr) => {{
        let result = $call;
        $self.fire($method).await;
        result
    }};
}

#[async_trait]
impl ForumStore for ScriptedStore {
    async fn insert_community(&self, community: &Community) -> Result<(), ForumError> {
        scripted!(self, "insert_community", self.inner.insert_community(community).await)
    }

    async fn find_community(&self, id: &ObjectId) -> Result<Option<Community>, ForumError> {
        scripted!(self, "find_community", self.inner.find_community(id).await)
    }

    async fn list_communities(&self) -> Result<Vec<Community>, ForumError> {
        scripted!(self, "list_communities", self.inner.list_communities().await)
    }

    async fn search_communities(&self, query: &str) -> Result<Vec<Community>, ForumError> {
        scripted!(self, "search_communities", self.inner.search_communities(query).await)
    }

    async fn update_community(
        &self,
        id: &ObjectId,
        changes: &CommunityChanges,
    ) -> Result<Option<Community>, ForumError> {
        scripted!(self, "update_community", self.inner.update_community(id, changes).await)
    }

    async fn push_rule(&self, id: &ObjectId, rule: &Rule) -> Result<Option<Community>, ForumError> {
        scripted!(self, "push_rule", self.inner.push_rule(id, rule).await)
    }

    async fn delete_community(&self, id: &ObjectId) -> Result<bool, ForumError> {
        scripted!(self, "delete_community", self.inner.delete_community(id).await)
    }

    async fn community_ids(&self) -> Result<Vec<ObjectId>, ForumError> {
        scripted!(self, "community_ids", self.inner.community_ids().await)
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<bool, ForumError> {
        scripted!(self, "insert_membership", self.inner.insert_membership(membership).await)
    }

    async fn find_membership(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<Membership>, ForumError> {
        scripted!(
            self,
            "find_membership",
            self.inner.find_membership(community_id, user_id).await
        )
    }

    async fn transition_membership(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
        from: Role,
        to: Role,
    ) -> Result<bool, ForumError> {
        scripted!(
            self,
            "transition_membership",
            self.inner
                .transition_membership(community_id, user_id, from, to)
                .await
        )
    }

    async fn remove_membership(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
        roles: &[Role],
    ) -> Result<bool, ForumError> {
        scripted!(
            self,
            "remove_membership",
            self.inner.remove_membership(community_id, user_id, roles).await
        )
    }

    async fn count_members(&self, community_id: &ObjectId) -> Result<u64, ForumError> {
        scripted!(self, "count_members", self.inner.count_members(community_id).await)
    }

    async fn list_memberships(&self, community_id: &ObjectId) -> Result<Vec<Membership>, ForumError> {
        scripted!(self, "list_memberships", self.inner.list_memberships(community_id).await)
    }

    async fn delete_memberships(&self, community_id: &ObjectId) -> Result<u64, ForumError> {
        scripted!(
            self,
            "delete_memberships",
            self.inner.delete_memberships(community_id).await
        )
    }

    async fn insert_post(&self, post: &Post) -> Result<(), ForumError> {
        scripted!(self, "insert_post", self.inner.insert_post(post).await)
    }

    async fn find_post(&self, id: &ObjectId) -> Result<Option<Post>, ForumError> {
        scripted!(self, "find_post", self.inner.find_post(id).await)
    }

    async fn record_post_view(&self, id: &ObjectId) -> Result<Option<Post>, ForumError> {
        scripted!(self, "record_post_view", self.inner.record_post_view(id).await)
    }

    async fn update_post(
        &self,
        id: &ObjectId,
        changes: &PostChanges,
        at: DateTime<Utc>,
    ) -> Result<Option<Post>, ForumError> {
        scripted!(self, "update_post", self.inner.update_post(id, changes, at).await)
    }

    async fn soft_delete_post(&self, id: &ObjectId, at: DateTime<Utc>) -> Result<bool, ForumError> {
        scripted!(self, "soft_delete_post", self.inner.soft_delete_post(id, at).await)
    }

    async fn remove_unreferenced_post(&self, id: &ObjectId) -> Result<bool, ForumError> {
        scripted!(
            self,
            "remove_unreferenced_post",
            self.inner.remove_unreferenced_post(id).await
        )
    }

    async fn list_posts(&self, community_id: &ObjectId) -> Result<Vec<Post>, ForumError> {
        scripted!(self, "list_posts", self.inner.list_posts(community_id).await)
    }

    async fn post_ids(&self) -> Result<Vec<ObjectId>, ForumError> {
        scripted!(self, "post_ids", self.inner.post_ids().await)
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), ForumError> {
        scripted!(self, "insert_comment", self.inner.insert_comment(comment).await)
    }

    async fn find_comment(&self, id: &ObjectId) -> Result<Option<Comment>, ForumError> {
        scripted!(self, "find_comment", self.inner.find_comment(id).await)
    }

    async fn update_comment_content(
        &self,
        id: &ObjectId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Comment>, ForumError> {
        scripted!(
            self,
            "update_comment_content",
            self.inner.update_comment_content(id, content, at).await
        )
    }

    async fn remove_comment(&self, id: &ObjectId) -> Result<bool, ForumError> {
        scripted!(self, "remove_comment", self.inner.remove_comment(id).await)
    }

    async fn soft_delete_comment(&self, id: &ObjectId, at: DateTime<Utc>) -> Result<bool, ForumError> {
        scripted!(self, "soft_delete_comment", self.inner.soft_delete_comment(id, at).await)
    }

    async fn list_comments(
        &self,
        post_id: &ObjectId,
        parent: Option<&ObjectId>,
    ) -> Result<Vec<Comment>, ForumError> {
        scripted!(self, "list_comments", self.inner.list_comments(post_id, parent).await)
    }

    async fn count_live_comments(&self, post_id: &ObjectId) -> Result<u64, ForumError> {
        scripted!(
            self,
            "count_live_comments",
            self.inner.count_live_comments(post_id).await
        )
    }

    async fn has_comments(&self, post_id: &ObjectId) -> Result<bool, ForumError> {
        scripted!(self, "has_comments", self.inner.has_comments(post_id).await)
    }

    async fn toggle_vote(
        &self,
        target: VoteTarget,
        entity_id: &ObjectId,
        user_id: &ObjectId,
        vote_type: VoteType,
        at: DateTime<Utc>,
    ) -> Result<Option<VoteTally>, ForumError> {
        self.take_fault()?;
        scripted!(
            self,
            "toggle_vote",
            self.inner
                .toggle_vote(target, entity_id, user_id, vote_type, at)
                .await
        )
    }

    async fn increment_comment_count(&self, post_id: &ObjectId, delta: i64) -> Result<(), ForumError> {
        self.take_fault()?;
        scripted!(
            self,
            "increment_comment_count",
            self.inner.increment_comment_count(post_id, delta).await
        )
    }

    async fn set_comment_count(
        &self,
        post_id: &ObjectId,
        expected: i64,
        value: i64,
    ) -> Result<bool, ForumError> {
        scripted!(
            self,
            "set_comment_count",
            self.inner.set_comment_count(post_id, expected, value).await
        )
    }

    async fn increment_member_count(&self, community_id: &ObjectId, delta: i64) -> Result<(), ForumError> {
        self.take_fault()?;
        scripted!(
            self,
            "increment_member_count",
            self.inner.increment_member_count(community_id, delta).await
        )
    }

    async fn set_member_count(
        &self,
        community_id: &ObjectId,
        expected: i64,
        value: i64,
    ) -> Result<bool, ForumError> {
        scripted!(
            self,
            "set_member_count",
            self.inner.set_member_count(community_id, expected, value).await
        )
    }
}

pub struct Forum {
    pub store: Arc<ScriptedStore>,
    pub bus: Arc<InMemoryBus>,
    pub communities: Arc<CommunityService>,
    pub posts: PostService,
    pub comments: CommentService,
    pub votes: VoteService,
}

pub fn forum() -> Forum {
    let store = Arc::new(ScriptedStore::new());
    let bus = Arc::new(InMemoryBus::new());
    let projector = Arc::new(CounterProjector::new(store.clone(), 3));
    let communities = Arc::new(CommunityService::new(
        store.clone(),
        bus.clone(),
        projector.clone(),
        Arc::new(DisabledMedia),
    ));
    let posts = PostService::new(store.clone(), communities.clone(), Arc::new(DisabledMedia));
    let comments = CommentService::new(
        store.clone(),
        bus.clone(),
        projector,
        Arc::new(DisabledMedia),
    );
    let votes = VoteService::new(store.clone(), bus.clone());

    Forum {
        store,
        bus,
        communities,
        posts,
        comments,
        votes,
    }
}

pub fn community_request(name: &str, privacy: Privacy) -> CreateCommunityRequest {
    CreateCommunityRequest {
        name: name.to_string(),
        description: format!("All about {}", name),
        category: Category::Technology,
        tags: vec!["rust".to_string()],
        privacy,
        banner_image: None,
        icon: None,
    }
}

pub fn comment_request(post_id: &ObjectId, parent: Option<&ObjectId>) -> CreateCommentRequest {
    CreateCommentRequest {
        post_id: post_id.to_hex(),
        content: "Agreed".to_string(),
        parent_comment: parent.map(|p| p.to_hex()),
        media: Vec::new(),
    }
}

impl Forum {
    /// A public community owned by `owner`.
    pub async fn community(&self, name: &str, owner: &ObjectId) -> ObjectId {
        self.communities
            .create_community(owner, community_request(name, Privacy::Public))
            .await
            .unwrap()
            .id
    }

    pub async fn post_in(&self, community_id: &ObjectId, author: &ObjectId) -> ObjectId {
        self.posts
            .create_post(
                author,
                CreatePostRequest {
                    title: "Borrow checker tips".to_string(),
                    content: "Share yours".to_string(),
                    community_id: community_id.to_hex(),
                    tags: Vec::new(),
                    media: Vec::new(),
                },
            )
            .await
            .unwrap()
            .id
    }

    pub async fn comment_on(&self, post_id: &ObjectId, author: &ObjectId, parent: Option<&ObjectId>) -> ObjectId {
        self.comments
            .create_comment(author, comment_request(post_id, parent))
            .await
            .unwrap()
            .id
    }
}
