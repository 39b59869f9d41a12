use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::media::MediaRef;
use crate::vote::model::{Votable, VoteType, Voter};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub content: String,
    pub author_id: ObjectId,
    pub community_id: ObjectId,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub media: Vec<MediaRef>,
    #[serde(default)]
    pub voters: Vec<Voter>,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default)]
    pub downvotes: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Post {
    pub fn new(
        author_id: ObjectId,
        community_id: ObjectId,
        title: String,
        content: String,
        tags: Vec<String>,
        media: Vec<MediaRef>,
    ) -> Self {
        let now = Utc::now();
        Post {
            id: ObjectId::new(),
            title,
            content,
            author_id,
            community_id,
            tags,
            media,
            voters: Vec::new(),
            upvotes: 0,
            downvotes: 0,
            comment_count: 0,
            view_count: 0,
            is_edited: false,
            edited_at: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            last_activity: now,
        }
    }
}

impl Votable for Post {
    fn voters(&self) -> &[Voter] {
        &self.voters
    }

    fn voters_mut(&mut self) -> &mut Vec<Voter> {
        &mut self.voters
    }

    fn set_tally(&mut self, upvotes: i64, downvotes: i64) {
        self.upvotes = upvotes;
        self.downvotes = downvotes;
        self.last_activity = Utc::now();
    }

    fn topic_post_id(&self) -> ObjectId {
        self.id
    }
}

/// A post as a given caller sees it. The voter set stays server-side; only
/// the caller's own vote is exposed.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PostView {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub content: String,
    pub author_id: ObjectId,
    pub community_id: ObjectId,
    pub tags: Vec<String>,
    pub media: Vec<MediaRef>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub user_vote: Option<VoteType>,
    pub comment_count: i64,
    pub view_count: i64,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl PostView {
    pub fn for_viewer(post: Post, viewer: &ObjectId) -> Self {
        let user_vote = post.vote_of(viewer);
        PostView {
            id: post.id,
            title: post.title,
            content: post.content,
            author_id: post.author_id,
            community_id: post.community_id,
            tags: post.tags,
            media: post.media,
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            user_vote,
            comment_count: post.comment_count,
            view_count: post.view_count,
            is_edited: post.is_edited,
            edited_at: post.edited_at,
            is_deleted: post.is_deleted,
            created_at: post.created_at,
            updated_at: post.updated_at,
            last_activity: post.last_activity,
        }
    }
}

/// Fields an author may change after creation. `community_id` is immutable.
#[derive(Debug, Default, Clone)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(alias = "communityId")]
    pub community_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub media: Vec<MediaRef>,
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}
