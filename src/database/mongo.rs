use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{Bson, Document, doc, oid::ObjectId, to_bson};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};

use crate::comment::model::Comment;
use crate::community::model::{Community, CommunityChanges, Membership, Role, Rule};
use crate::database::store::ForumStore;
use crate::post::model::{Post, PostChanges};
use crate::utils::error::ForumError;
use crate::utils::validation::DELETED_MARKER;
use crate::vote::model::{VoteTally, VoteTarget, VoteType};

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

fn member_roles() -> Vec<&'static str> {
    vec![Role::Member.as_str(), Role::Moderator.as_str()]
}

/// Update pipeline implementing the vote toggle server-side, so the voter
/// set and both counters change in one document write.
fn toggle_pipeline(user_id: &ObjectId, vote_type: VoteType, at: &Bson, touch_activity: bool) -> Vec<Document> {
    let vote = vote_type.as_str();
    let own_record = doc! { "$eq": ["$$v.user_id", user_id] };
    let fresh = doc! { "user_id": user_id, "vote_type": vote, "voted_at": at.clone() };

    let mut counters = doc! {
        "upvotes": { "$size": { "$filter": {
            "input": "$voters", "as": "v", "cond": { "$eq": ["$$v.vote_type", VoteType::Up.as_str()] }
        } } },
        "downvotes": { "$size": { "$filter": {
            "input": "$voters", "as": "v", "cond": { "$eq": ["$$v.vote_type", VoteType::Down.as_str()] }
        } } },
    };
    if touch_activity {
        counters.insert("last_activity", at.clone());
    }

    vec![
        doc! { "$set": {
            "voters": { "$ifNull": ["$voters", []] },
        } },
        doc! { "$set": {
            "__prior": { "$arrayElemAt": [
                { "$filter": { "input": "$voters", "as": "v", "cond": own_record.clone() } },
                0
            ] },
        } },
        doc! { "$set": {
            "voters": { "$switch": {
                "branches": [
                    {
                        "case": { "$eq": [{ "$ifNull": ["$__prior", Bson::Null] }, Bson::Null] },
                        "then": { "$concatArrays": ["$voters", [fresh.clone()]] },
                    },
                    {
                        "case": { "$eq": ["$__prior.vote_type", vote] },
                        "then": { "$filter": {
                            "input": "$voters", "as": "v", "cond": { "$ne": ["$$v.user_id", user_id] }
                        } },
                    },
                ],
                "default": { "$map": {
                    "input": "$voters",
                    "as": "v",
                    "in": { "$cond": [
                        own_record,
                        { "user_id": "$$v.user_id", "vote_type": vote, "voted_at": at.clone() },
                        "$$v"
                    ] },
                } },
            } },
        } },
        doc! { "$set": counters },
        doc! { "$unset": "__prior" },
    ]
}

pub struct MongoStore {
    communities: Collection<Community>,
    memberships: Collection<Membership>,
    posts: Collection<Post>,
    comments: Collection<Comment>,
}

impl MongoStore {
    pub fn new(client: &Client, database: &str) -> Self {
        let db = client.database(database);
        MongoStore {
            communities: db.collection::<Community>("communities"),
            memberships: db.collection::<Membership>("memberships"),
            posts: db.collection::<Post>("posts"),
            comments: db.collection::<Comment>("comments"),
        }
    }

    /// Creates the indexes the store relies on for uniqueness and lookups.
    pub async fn ensure_indexes(&self) -> Result<(), ForumError> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.communities
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "name": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.memberships
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "community_id": 1, "user_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.posts
            .create_index(IndexModel::builder().keys(doc! { "community_id": 1, "_id": -1 }).build())
            .await?;
        self.comments
            .create_index(IndexModel::builder().keys(doc! { "post_id": 1, "parent_comment": 1 }).build())
            .await?;

        log::info!("MongoDB indexes are in place");
        Ok(())
    }
}

#[async_trait]
impl ForumStore for MongoStore {
    async fn insert_community(&self, community: &Community) -> Result<(), ForumError> {
        match self.communities.insert_one(community).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(ForumError::Conflict(
                "Community name already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_community(&self, id: &ObjectId) -> Result<Option<Community>, ForumError> {
        Ok(self.communities.find_one(doc! { "_id": id }).await?)
    }

    async fn list_communities(&self) -> Result<Vec<Community>, ForumError> {
        let cursor = self.communities.find(doc! {}).sort(doc! { "_id": -1 }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn search_communities(&self, query: &str) -> Result<Vec<Community>, ForumError> {
        let pattern = doc! { "$regex": regex::escape(query), "$options": "i" };
        let filter = doc! { "$or": [
            { "name": pattern.clone() },
            { "description": pattern.clone() },
            { "tags": pattern },
        ] };
        let cursor = self.communities.find(filter).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_community(
        &self,
        id: &ObjectId,
        changes: &CommunityChanges,
    ) -> Result<Option<Community>, ForumError> {
        let mut set = doc! { "updated_at": to_bson(&Utc::now())? };
        if let Some(description) = &changes.description {
            set.insert("description", description);
        }
        if let Some(category) = &changes.category {
            set.insert("category", to_bson(category)?);
        }
        if let Some(tags) = &changes.tags {
            set.insert("tags", tags.clone());
        }
        if let Some(privacy) = &changes.privacy {
            set.insert("privacy", to_bson(privacy)?);
        }
        if let Some(banner) = &changes.banner_image {
            set.insert("banner_image", to_bson(banner)?);
        }
        if let Some(icon) = &changes.icon {
            set.insert("icon", to_bson(icon)?);
        }

        Ok(self
            .communities
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn push_rule(&self, id: &ObjectId, rule: &Rule) -> Result<Option<Community>, ForumError> {
        let update = doc! {
            "$push": { "rules": { "title": &rule.title, "description": &rule.description } },
            "$set": { "updated_at": to_bson(&Utc::now())? },
        };
        Ok(self
            .communities
            .find_one_and_update(doc! { "_id": id }, update)
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn delete_community(&self, id: &ObjectId) -> Result<bool, ForumError> {
        let result = self.communities.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn community_ids(&self) -> Result<Vec<ObjectId>, ForumError> {
        let cursor = self
            .communities
            .clone_with_type::<Document>()
            .find(doc! {})
            .projection(doc! { "_id": 1 })
            .await?;
        let rows: Vec<Document> = cursor.try_collect().await?;
        Ok(rows.iter().filter_map(|row| row.get_object_id("_id").ok()).collect())
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<bool, ForumError> {
        match self.memberships.insert_one(membership).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_membership(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
    ) -> Result<Option<Membership>, ForumError> {
        Ok(self
            .memberships
            .find_one(doc! { "community_id": community_id, "user_id": user_id })
            .await?)
    }

    async fn transition_membership(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
        from: Role,
        to: Role,
    ) -> Result<bool, ForumError> {
        let result = self
            .memberships
            .update_one(
                doc! { "community_id": community_id, "user_id": user_id, "role": from.as_str() },
                doc! { "$set": { "role": to.as_str(), "updated_at": to_bson(&Utc::now())? } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn remove_membership(
        &self,
        community_id: &ObjectId,
        user_id: &ObjectId,
        roles: &[Role],
    ) -> Result<bool, ForumError> {
        let roles: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
        let result = self
            .memberships
            .delete_one(doc! {
                "community_id": community_id,
                "user_id": user_id,
                "role": { "$in": roles },
            })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn count_members(&self, community_id: &ObjectId) -> Result<u64, ForumError> {
        Ok(self
            .memberships
            .count_documents(doc! {
                "community_id": community_id,
                "role": { "$in": member_roles() },
            })
            .await?)
    }

    async fn list_memberships(&self, community_id: &ObjectId) -> Result<Vec<Membership>, ForumError> {
        let cursor = self
            .memberships
            .find(doc! { "community_id": community_id })
            .sort(doc! { "_id": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_memberships(&self, community_id: &ObjectId) -> Result<u64, ForumError> {
        let result = self
            .memberships
            .delete_many(doc! { "community_id": community_id })
            .await?;
        Ok(result.deleted_count)
    }

    async fn insert_post(&self, post: &Post) -> Result<(), ForumError> {
        self.posts.insert_one(post).await?;
        Ok(())
    }

    async fn find_post(&self, id: &ObjectId) -> Result<Option<Post>, ForumError> {
        Ok(self.posts.find_one(doc! { "_id": id }).await?)
    }

    async fn record_post_view(&self, id: &ObjectId) -> Result<Option<Post>, ForumError> {
        let update = doc! {
            "$inc": { "view_count": 1 },
            "$set": { "last_activity": to_bson(&Utc::now())? },
        };
        Ok(self
            .posts
            .find_one_and_update(doc! { "_id": id }, update)
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn update_post(
        &self,
        id: &ObjectId,
        changes: &PostChanges,
        at: DateTime<Utc>,
    ) -> Result<Option<Post>, ForumError> {
        let at = to_bson(&at)?;
        let mut set = doc! {
            "is_edited": true,
            "edited_at": at.clone(),
            "updated_at": at.clone(),
            "last_activity": at,
        };
        if let Some(title) = &changes.title {
            set.insert("title", title);
        }
        if let Some(content) = &changes.content {
            set.insert("content", content);
        }
        if let Some(tags) = &changes.tags {
            set.insert("tags", tags.clone());
        }

        Ok(self
            .posts
            .find_one_and_update(doc! { "_id": id, "is_deleted": false }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn soft_delete_post(&self, id: &ObjectId, at: DateTime<Utc>) -> Result<bool, ForumError> {
        let result = self
            .posts
            .update_one(
                doc! { "_id": id, "is_deleted": false },
                doc! { "$set": {
                    "is_deleted": true,
                    "content": DELETED_MARKER,
                    "media": [],
                    "updated_at": to_bson(&at)?,
                } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn remove_unreferenced_post(&self, id: &ObjectId) -> Result<bool, ForumError> {
        let result = self
            .posts
            .delete_one(doc! { "_id": id, "is_deleted": true, "voters.0": { "$exists": false } })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn list_posts(&self, community_id: &ObjectId) -> Result<Vec<Post>, ForumError> {
        let cursor = self
            .posts
            .find(doc! { "community_id": community_id, "is_deleted": false })
            .sort(doc! { "_id": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn post_ids(&self) -> Result<Vec<ObjectId>, ForumError> {
        let cursor = self
            .posts
            .clone_with_type::<Document>()
            .find(doc! {})
            .projection(doc! { "_id": 1 })
            .await?;
        let rows: Vec<Document> = cursor.try_collect().await?;
        Ok(rows.iter().filter_map(|row| row.get_object_id("_id").ok()).collect())
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), ForumError> {
        self.comments.insert_one(comment).await?;
        Ok(())
    }

    async fn find_comment(&self, id: &ObjectId) -> Result<Option<Comment>, ForumError> {
        Ok(self.comments.find_one(doc! { "_id": id }).await?)
    }

    async fn remove_comment(&self, id: &ObjectId) -> Result<bool, ForumError> {
        let result = self.comments.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn update_comment_content(
        &self,
        id: &ObjectId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Comment>, ForumError> {
        let at = to_bson(&at)?;
        Ok(self
            .comments
            .find_one_and_update(
                doc! { "_id": id, "is_deleted": false },
                doc! { "$set": {
                    "content": content,
                    "is_edited": true,
                    "edited_at": at.clone(),
                    "updated_at": at,
                } },
            )
            .return_document(ReturnDocument::After)
            .await?)
    }

    async fn soft_delete_comment(&self, id: &ObjectId, at: DateTime<Utc>) -> Result<bool, ForumError> {
        let result = self
            .comments
            .update_one(
                doc! { "_id": id, "is_deleted": false },
                doc! { "$set": {
                    "is_deleted": true,
                    "content": DELETED_MARKER,
                    "media": [],
                    "updated_at": to_bson(&at)?,
                } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn list_comments(
        &self,
        post_id: &ObjectId,
        parent: Option<&ObjectId>,
    ) -> Result<Vec<Comment>, ForumError> {
        let parent = parent.map_or(Bson::Null, |id| Bson::ObjectId(*id));
        let cursor = self
            .comments
            .find(doc! { "post_id": post_id, "parent_comment": parent })
            .sort(doc! { "_id": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count_live_comments(&self, post_id: &ObjectId) -> Result<u64, ForumError> {
        Ok(self
            .comments
            .count_documents(doc! { "post_id": post_id, "is_deleted": false })
            .await?)
    }

    async fn has_comments(&self, post_id: &ObjectId) -> Result<bool, ForumError> {
        let found = self
            .comments
            .count_documents(doc! { "post_id": post_id })
            .limit(1)
            .await?;
        Ok(found > 0)
    }

    async fn toggle_vote(
        &self,
        target: VoteTarget,
        entity_id: &ObjectId,
        user_id: &ObjectId,
        vote_type: VoteType,
        at: DateTime<Utc>,
    ) -> Result<Option<VoteTally>, ForumError> {
        let at = to_bson(&at)?;
        let filter = doc! { "_id": entity_id, "is_deleted": false };

        let tally = match target {
            VoteTarget::Post => self
                .posts
                .find_one_and_update(filter, toggle_pipeline(user_id, vote_type, &at, true))
                .return_document(ReturnDocument::After)
                .await?
                .map(|post| VoteTally::from_entity(*entity_id, &post, post.upvotes, post.downvotes)),
            VoteTarget::Comment => self
                .comments
                .find_one_and_update(filter, toggle_pipeline(user_id, vote_type, &at, false))
                .return_document(ReturnDocument::After)
                .await?
                .map(|comment| {
                    VoteTally::from_entity(*entity_id, &comment, comment.upvotes, comment.downvotes)
                }),
        };
        Ok(tally)
    }

    async fn increment_comment_count(&self, post_id: &ObjectId, delta: i64) -> Result<(), ForumError> {
        self.posts
            .update_one(doc! { "_id": post_id }, doc! { "$inc": { "comment_count": delta } })
            .await?;
        Ok(())
    }

    async fn set_comment_count(
        &self,
        post_id: &ObjectId,
        expected: i64,
        value: i64,
    ) -> Result<bool, ForumError> {
        let result = self
            .posts
            .update_one(
                doc! { "_id": post_id, "comment_count": expected },
                doc! { "$set": { "comment_count": value } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn increment_member_count(&self, community_id: &ObjectId, delta: i64) -> Result<(), ForumError> {
        self.communities
            .update_one(doc! { "_id": community_id }, doc! { "$inc": { "member_count": delta } })
            .await?;
        Ok(())
    }

    async fn set_member_count(
        &self,
        community_id: &ObjectId,
        expected: i64,
        value: i64,
    ) -> Result<bool, ForumError> {
        let result = self
            .communities
            .update_one(
                doc! { "_id": community_id, "member_count": expected },
                doc! { "$set": { "member_count": value } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }
}
