use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::media::MediaRef;
use crate::vote::model::{Votable, VoteType, Voter};

/// A comment points at its parent only; the replies of a comment are the
/// comments whose `parent_comment` is its id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub post_id: ObjectId,
    pub author_id: ObjectId,
    pub parent_comment: Option<ObjectId>,
    pub content: String,
    #[serde(default)]
    pub media: Vec<MediaRef>,
    #[serde(default)]
    pub voters: Vec<Voter>,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        post_id: ObjectId,
        author_id: ObjectId,
        parent_comment: Option<ObjectId>,
        content: String,
        media: Vec<MediaRef>,
    ) -> Self {
        let now = Utc::now();
        Comment {
            id: ObjectId::new(),
            post_id,
            author_id,
            parent_comment,
            content,
            media,
            voters: Vec::new(),
            upvotes: 0,
            downvotes: 0,
            is_edited: false,
            edited_at: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A comment as a given caller sees it, with the caller's vote in place of
/// the voter set.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CommentView {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub post_id: ObjectId,
    pub author_id: ObjectId,
    pub parent_comment: Option<ObjectId>,
    pub content: String,
    pub media: Vec<MediaRef>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub user_vote: Option<VoteType>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentView {
    pub fn for_viewer(comment: Comment, viewer: &ObjectId) -> Self {
        let user_vote = comment.vote_of(viewer);
        CommentView {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            parent_comment: comment.parent_comment,
            content: comment.content,
            media: comment.media,
            upvotes: comment.upvotes,
            downvotes: comment.downvotes,
            user_vote,
            is_edited: comment.is_edited,
            edited_at: comment.edited_at,
            is_deleted: comment.is_deleted,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

impl Votable for Comment {
    fn voters(&self) -> &[Voter] {
        &self.voters
    }

    fn voters_mut(&mut self) -> &mut Vec<Voter> {
        &mut self.voters
    }

    fn set_tally(&mut self, upvotes: i64, downvotes: i64) {
        self.upvotes = upvotes;
        self.downvotes = downvotes;
    }

    fn topic_post_id(&self) -> ObjectId {
        self.post_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    #[default]
    Newest,
    Oldest,
    Popular,
}

impl CommentSort {
    pub fn apply(self, comments: &mut [Comment]) {
        match self {
            CommentSort::Newest => comments.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            CommentSort::Oldest => comments.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            CommentSort::Popular => comments.sort_by(|a, b| {
                b.upvotes
                    .cmp(&a.upvotes)
                    .then_with(|| b.created_at.cmp(&a.created_at))
            }),
        }
    }
}

#[derive(Deserialize)]
pub struct CommentListQuery {
    #[serde(default)]
    pub sort: CommentSort,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    #[serde(alias = "postId")]
    pub post_id: String,
    pub content: String,
    #[serde(default, alias = "parentComment")]
    pub parent_comment: Option<String>,
    #[serde(default)]
    pub media: Vec<MediaRef>,
}

#[derive(Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}
