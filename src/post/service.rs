use std::sync::Arc;

use chrono::Utc;
use mongodb::bson::oid::ObjectId;

use crate::community::service::CommunityService;
use crate::database::ForumStore;
use crate::media::{MediaStore, purge_media};
use crate::post::model::{CreatePostRequest, Post, PostChanges, UpdatePostRequest};
use crate::utils::error::ForumError;
use crate::utils::validation::{
    MAX_POST_CONTENT, MAX_POST_TITLE, normalize_tags, optional_text, parse_object_id, required_text,
};

/// How a post left the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostRemoval {
    /// Content replaced by the deletion marker; the thread stays readable.
    Soft,
    /// Nothing referenced the post, so the document is gone.
    Hard,
    AlreadyDeleted,
}

pub struct PostService {
    store: Arc<dyn ForumStore>,
    communities: Arc<CommunityService>,
    media: Arc<dyn MediaStore>,
}

impl PostService {
    pub fn new(
        store: Arc<dyn ForumStore>,
        communities: Arc<CommunityService>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        PostService {
            store,
            communities,
            media,
        }
    }

    async fn find(&self, post_id: &ObjectId) -> Result<Post, ForumError> {
        self.store
            .find_post(post_id)
            .await?
            .ok_or_else(|| ForumError::NotFound("Post not found".to_string()))
    }

    /// Only members of the community may post. Creation is never retried.
    pub async fn create_post(&self, author_id: &ObjectId, req: CreatePostRequest) -> Result<Post, ForumError> {
        let community_id = parse_object_id(&req.community_id, "community")?;
        let title = required_text("Title", &req.title, MAX_POST_TITLE)?;
        let content = required_text("Content", &req.content, MAX_POST_CONTENT)?;

        let community = self.communities.get_community(&community_id).await?;
        if !self.communities.is_member(&community, author_id).await? {
            return Err(ForumError::Forbidden(
                "Only members can post in this community".to_string(),
            ));
        }

        let post = Post::new(
            *author_id,
            community_id,
            title,
            content,
            normalize_tags(&req.tags),
            req.media,
        );
        self.store
            .insert_post(&post)
            .await
            .map_err(ForumError::not_retryable)?;

        log::info!("Post {} created in community {}", post.id, community_id);
        Ok(post)
    }

    /// Returns the post and counts the view.
    pub async fn get_post(&self, post_id: &ObjectId) -> Result<Post, ForumError> {
        self.store
            .record_post_view(post_id)
            .await?
            .ok_or_else(|| ForumError::NotFound("Post not found".to_string()))
    }

    pub async fn list_community_posts(&self, community_id: &ObjectId) -> Result<Vec<Post>, ForumError> {
        self.communities.get_community(community_id).await?;
        self.store.list_posts(community_id).await
    }

    pub async fn update_post(
        &self,
        post_id: &ObjectId,
        caller: &ObjectId,
        req: UpdatePostRequest,
    ) -> Result<Post, ForumError> {
        let post = self.find(post_id).await?;
        if post.author_id != *caller {
            return Err(ForumError::Forbidden(
                "Only the author can edit this post".to_string(),
            ));
        }
        if post.is_deleted {
            return Err(ForumError::InvalidState("Post has been deleted".to_string()));
        }

        let changes = PostChanges {
            title: optional_text("Title", req.title.as_deref(), MAX_POST_TITLE)?,
            content: optional_text("Content", req.content.as_deref(), MAX_POST_CONTENT)?,
            tags: req.tags.as_deref().map(normalize_tags),
        };
        if changes.title.is_none() && changes.content.is_none() && changes.tags.is_none() {
            return Err(ForumError::InvalidArgument("Nothing to update".to_string()));
        }

        self.store
            .update_post(post_id, &changes, Utc::now())
            .await?
            .ok_or_else(|| ForumError::InvalidState("Post has been deleted".to_string()))
    }

    /// Author or community moderators.
    ///
    /// The post is flagged deleted first, which closes it to new votes and
    /// comments. The document is then removed only if the store still finds
    /// it without voters and no comment references it; otherwise it stays
    /// soft-deleted so replies keep their context.
    pub async fn delete_post(&self, post_id: &ObjectId, caller: &ObjectId) -> Result<PostRemoval, ForumError> {
        let post = self.find(post_id).await?;
        if post.author_id != *caller {
            let community = self.communities.get_community(&post.community_id).await?;
            if !self.communities.can_moderate(&community, caller).await? {
                return Err(ForumError::Forbidden(
                    "Only the author or a moderator can delete this post".to_string(),
                ));
            }
        }
        if post.is_deleted || !self.store.soft_delete_post(post_id, Utc::now()).await? {
            return Ok(PostRemoval::AlreadyDeleted);
        }

        let removal = if !self.store.has_comments(post_id).await?
            && self.store.remove_unreferenced_post(post_id).await?
        {
            PostRemoval::Hard
        } else {
            PostRemoval::Soft
        };

        purge_media(self.media.as_ref(), &post.media).await;
        log::info!("Post {} deleted by {} ({:?})", post_id, caller, removal);
        Ok(removal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::model::Comment;
    use crate::community::model::{Category, CreateCommunityRequest, Privacy};
    use crate::counters::CounterProjector;
    use crate::database::MemoryStore;
    use crate::media::DisabledMedia;
    use crate::realtime::notifier::InMemoryBus;
    use crate::vote::model::{VoteTarget, VoteType};

    struct Fixture {
        store: Arc<MemoryStore>,
        communities: Arc<CommunityService>,
        posts: PostService,
        creator: ObjectId,
        community_id: ObjectId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let projector = Arc::new(CounterProjector::new(store.clone(), 5));
        let communities = Arc::new(CommunityService::new(
            store.clone(),
            Arc::new(InMemoryBus::new()),
            projector,
            Arc::new(DisabledMedia),
        ));
        let posts = PostService::new(store.clone(), communities.clone(), Arc::new(DisabledMedia));
        let creator = ObjectId::new();
        let community = communities
            .create_community(
                &creator,
                CreateCommunityRequest {
                    name: "posting".into(),
                    description: "a community".into(),
                    category: Category::Other,
                    tags: Vec::new(),
                    privacy: Privacy::Public,
                    banner_image: None,
                    icon: None,
                },
            )
            .await
            .unwrap();
        Fixture {
            store,
            communities,
            posts,
            creator,
            community_id: community.id,
        }
    }

    fn new_post(community_id: &ObjectId) -> CreatePostRequest {
        CreatePostRequest {
            title: "  Hello  ".into(),
            content: "First post".into(),
            community_id: community_id.to_hex(),
            tags: vec!["Intro".into()],
            media: Vec::new(),
        }
    }

    #[actix_web::test]
    async fn only_members_can_post() {
        let f = fixture().await;
        let outsider = ObjectId::new();

        let err = f.posts.create_post(&outsider, new_post(&f.community_id)).await.unwrap_err();
        assert!(matches!(err, ForumError::Forbidden(_)));

        f.communities.join(&f.community_id, &outsider).await.unwrap();
        let post = f.posts.create_post(&outsider, new_post(&f.community_id)).await.unwrap();
        assert_eq!(post.title, "Hello");
        assert_eq!(post.tags, vec!["intro"]);
    }

    #[actix_web::test]
    async fn viewing_counts_and_editing_marks_the_post() {
        let f = fixture().await;
        let post = f.posts.create_post(&f.creator, new_post(&f.community_id)).await.unwrap();

        assert_eq!(f.posts.get_post(&post.id).await.unwrap().view_count, 1);
        assert_eq!(f.posts.get_post(&post.id).await.unwrap().view_count, 2);

        let err = f
            .posts
            .update_post(
                &post.id,
                &ObjectId::new(),
                UpdatePostRequest {
                    title: Some("hijack".into()),
                    content: None,
                    tags: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ForumError::Forbidden(_)));

        let edited = f
            .posts
            .update_post(
                &post.id,
                &f.creator,
                UpdatePostRequest {
                    title: None,
                    content: Some("Edited".into()),
                    tags: None,
                },
            )
            .await
            .unwrap();
        assert!(edited.is_edited);
        assert!(edited.edited_at.is_some());
        assert_eq!(edited.content, "Edited");
    }

    #[actix_web::test]
    async fn unreferenced_posts_are_removed() {
        let f = fixture().await;
        let post = f.posts.create_post(&f.creator, new_post(&f.community_id)).await.unwrap();

        assert_eq!(f.posts.delete_post(&post.id, &f.creator).await.unwrap(), PostRemoval::Hard);
        assert!(f.store.find_post(&post.id).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn referenced_posts_are_soft_deleted() {
        let f = fixture().await;
        let post = f.posts.create_post(&f.creator, new_post(&f.community_id)).await.unwrap();
        let comment = Comment::new(post.id, f.creator, None, "reply".into(), Vec::new());
        f.store.insert_comment(&comment).await.unwrap();

        assert_eq!(f.posts.delete_post(&post.id, &f.creator).await.unwrap(), PostRemoval::Soft);
        let stored = f.store.find_post(&post.id).await.unwrap().unwrap();
        assert!(stored.is_deleted);
        assert_eq!(stored.content, "[deleted]");
        assert!(f.posts.list_community_posts(&f.community_id).await.unwrap().is_empty());

        assert_eq!(
            f.posts.delete_post(&post.id, &f.creator).await.unwrap(),
            PostRemoval::AlreadyDeleted
        );
    }

    #[actix_web::test]
    async fn moderators_may_delete_other_posts() {
        let f = fixture().await;
        let author = ObjectId::new();
        let moderator = ObjectId::new();
        let bystander = ObjectId::new();
        for user in [&author, &moderator, &bystander] {
            f.communities.join(&f.community_id, user).await.unwrap();
        }
        f.communities.promote(&f.community_id, &f.creator, &moderator).await.unwrap();
        let post = f.posts.create_post(&author, new_post(&f.community_id)).await.unwrap();
        f.store
            .toggle_vote(VoteTarget::Post, &post.id, &bystander, VoteType::Up, Utc::now())
            .await
            .unwrap();

        let err = f.posts.delete_post(&post.id, &bystander).await.unwrap_err();
        assert!(matches!(err, ForumError::Forbidden(_)));
        assert_eq!(f.posts.delete_post(&post.id, &moderator).await.unwrap(), PostRemoval::Soft);
    }

    #[actix_web::test]
    async fn creation_failures_are_not_retryable() {
        let f = fixture().await;
        let err = f
            .posts
            .create_post(
                &f.creator,
                CreatePostRequest {
                    community_id: "nope".into(),
                    ..new_post(&f.community_id)
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ForumError::InvalidArgument(_)));
        assert!(!err.is_retryable());
    }
}
