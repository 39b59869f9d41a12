use std::sync::Arc;

use chrono::Utc;
use mongodb::bson::oid::ObjectId;

use crate::comment::model::{Comment, CommentSort, CreateCommentRequest, UpdateCommentRequest};
use crate::counters::CounterProjector;
use crate::database::ForumStore;
use crate::media::{MediaStore, purge_media};
use crate::realtime::model::{ForumEvent, Topic};
use crate::realtime::notifier::Notifier;
use crate::utils::error::ForumError;
use crate::utils::validation::{MAX_COMMENT_CONTENT, parse_object_id, required_text};

pub struct CommentService {
    store: Arc<dyn ForumStore>,
    notifier: Arc<dyn Notifier>,
    projector: Arc<CounterProjector>,
    media: Arc<dyn MediaStore>,
}

impl CommentService {
    pub fn new(
        store: Arc<dyn ForumStore>,
        notifier: Arc<dyn Notifier>,
        projector: Arc<CounterProjector>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        CommentService {
            store,
            notifier,
            projector,
            media,
        }
    }

    async fn find(&self, comment_id: &ObjectId) -> Result<Comment, ForumError> {
        self.store
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| ForumError::NotFound("Comment not found".to_string()))
    }

    /// Adds a top-level comment or, with `parent_comment`, a reply to a
    /// comment of the same post.
    pub async fn create_comment(
        &self,
        author_id: &ObjectId,
        req: CreateCommentRequest,
    ) -> Result<Comment, ForumError> {
        let post_id = parse_object_id(&req.post_id, "post")?;
        let content = required_text("Content", &req.content, MAX_COMMENT_CONTENT)?;
        let parent_id = req
            .parent_comment
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_object_id(raw, "parent comment"))
            .transpose()?;

        let post = self
            .store
            .find_post(&post_id)
            .await?
            .ok_or_else(|| ForumError::NotFound("Post not found".to_string()))?;
        if post.is_deleted {
            return Err(ForumError::InvalidState(
                "Cannot comment on a deleted post".to_string(),
            ));
        }

        if let Some(parent_id) = &parent_id {
            let parent = self
                .store
                .find_comment(parent_id)
                .await?
                .ok_or_else(|| ForumError::NotFound("Parent comment not found".to_string()))?;
            if parent.post_id != post_id {
                return Err(ForumError::InvalidArgument(
                    "Parent comment belongs to a different post".to_string(),
                ));
            }
        }

        let comment = Comment::new(post_id, *author_id, parent_id, content, req.media);
        self.store
            .insert_comment(&comment)
            .await
            .map_err(ForumError::not_retryable)?;

        // The post may have been deleted since the check above.
        let still_open = self
            .store
            .find_post(&post_id)
            .await
            .map_err(ForumError::not_retryable)?
            .is_some_and(|p| !p.is_deleted);
        if !still_open {
            self.store.remove_comment(&comment.id).await?;
            return Err(ForumError::InvalidState(
                "Cannot comment on a deleted post".to_string(),
            ));
        }

        self.projector.comment_added(&post_id).await;
        self.notifier.publish(
            &Topic::Post(post_id),
            &ForumEvent::CommentCreated {
                post_id: post_id.to_hex(),
                comment: comment.clone(),
            },
        );
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        comment_id: &ObjectId,
        caller: &ObjectId,
        req: UpdateCommentRequest,
    ) -> Result<Comment, ForumError> {
        let comment = self.find(comment_id).await?;
        if comment.author_id != *caller {
            return Err(ForumError::Forbidden(
                "Only the author can edit this comment".to_string(),
            ));
        }
        if comment.is_deleted {
            return Err(ForumError::InvalidState(
                "Comment has been deleted".to_string(),
            ));
        }
        let content = required_text("Content", &req.content, MAX_COMMENT_CONTENT)?;

        let updated = self
            .store
            .update_comment_content(comment_id, &content, Utc::now())
            .await?
            .ok_or_else(|| ForumError::InvalidState("Comment has been deleted".to_string()))?;

        self.notifier.publish(
            &Topic::Post(updated.post_id),
            &ForumEvent::CommentUpdated {
                post_id: updated.post_id.to_hex(),
                comment: updated.clone(),
            },
        );
        Ok(updated)
    }

    /// Soft delete: replies stay attached. Repeating the call changes
    /// nothing and does not touch `comment_count` again.
    pub async fn delete_comment(&self, comment_id: &ObjectId, caller: &ObjectId) -> Result<(), ForumError> {
        let comment = self.find(comment_id).await?;
        if comment.author_id != *caller {
            return Err(ForumError::Forbidden(
                "Only the author can delete this comment".to_string(),
            ));
        }

        if !self.store.soft_delete_comment(comment_id, Utc::now()).await? {
            log::debug!("Comment {} was already deleted", comment_id);
            return Ok(());
        }

        self.projector.comment_removed(&comment.post_id).await;
        self.notifier.publish(
            &Topic::Post(comment.post_id),
            &ForumEvent::CommentDeleted {
                post_id: comment.post_id.to_hex(),
                comment_id: comment_id.to_hex(),
            },
        );
        purge_media(self.media.as_ref(), &comment.media).await;
        Ok(())
    }

    /// Top-level comments of a post.
    pub async fn list_post_comments(
        &self,
        post_id: &ObjectId,
        sort: CommentSort,
    ) -> Result<Vec<Comment>, ForumError> {
        if self.store.find_post(post_id).await?.is_none() {
            return Err(ForumError::NotFound("Post not found".to_string()));
        }
        let mut comments = self.store.list_comments(post_id, None).await?;
        sort.apply(&mut comments);
        Ok(comments)
    }

    /// Direct replies, oldest first.
    pub async fn list_replies(&self, comment_id: &ObjectId) -> Result<Vec<Comment>, ForumError> {
        let parent = self.find(comment_id).await?;
        let mut replies = self
            .store
            .list_comments(&parent.post_id, Some(&parent.id))
            .await?;
        CommentSort::Oldest.apply(&mut replies);
        Ok(replies)
    }
}
