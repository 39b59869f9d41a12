use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::media::MediaRef;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Technology,
    Health,
    Entertainment,
    Science,
    Arts,
    Sports,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Community {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub privacy: Privacy,
    pub creator_id: ObjectId,
    #[serde(default)]
    pub member_count: i64,
    pub banner_image: Option<MediaRef>,
    pub icon: Option<MediaRef>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Community {
    pub fn is_creator(&self, user_id: &ObjectId) -> bool {
        self.creator_id == *user_id
    }
}

/// Role of a user inside a community. Exactly one row exists per
/// (community, user) pair, so a pending request can never coexist with
/// membership, and moderators are always members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Pending,
    Member,
    Moderator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Pending => "pending",
            Role::Member => "member",
            Role::Moderator => "moderator",
        }
    }

    pub fn is_member(self) -> bool {
        matches!(self, Role::Member | Role::Moderator)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Membership {
    pub community_id: ObjectId,
    pub user_id: ObjectId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(community_id: ObjectId, user_id: ObjectId, role: Role) -> Self {
        let now = Utc::now();
        Membership {
            community_id,
            user_id,
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-pair state as seen from outside. Creator is a property of the
/// community, reported separately in [`MembershipView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    None,
    Pending,
    Member,
    Moderator,
}

impl From<Option<Role>> for MembershipState {
    fn from(role: Option<Role>) -> Self {
        match role {
            None => MembershipState::None,
            Some(Role::Pending) => MembershipState::Pending,
            Some(Role::Member) => MembershipState::Member,
            Some(Role::Moderator) => MembershipState::Moderator,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipView {
    pub community_id: ObjectId,
    pub user_id: ObjectId,
    pub state: MembershipState,
    pub is_creator: bool,
    pub can_moderate: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub members: Vec<ObjectId>,
    pub moderators: Vec<ObjectId>,
    /// Only filled in for callers who can moderate.
    pub join_requests: Vec<ObjectId>,
}

#[derive(Debug, Default, Clone)]
pub struct CommunityChanges {
    pub description: Option<String>,
    pub category: Option<Category>,
    pub tags: Option<Vec<String>>,
    pub privacy: Option<Privacy>,
    pub banner_image: Option<MediaRef>,
    pub icon: Option<MediaRef>,
}

impl CommunityChanges {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.category.is_none()
            && self.tags.is_none()
            && self.privacy.is_none()
            && self.banner_image.is_none()
            && self.icon.is_none()
    }
}

#[derive(Deserialize)]
pub struct CreateCommunityRequest {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub privacy: Privacy,
    #[serde(default, alias = "bannerImage")]
    pub banner_image: Option<MediaRef>,
    #[serde(default)]
    pub icon: Option<MediaRef>,
}

#[derive(Deserialize)]
pub struct UpdateCommunityRequest {
    pub description: Option<String>,
    pub category: Option<Category>,
    pub tags: Option<Vec<String>>,
    pub privacy: Option<Privacy>,
}

#[derive(Deserialize)]
pub struct UpdateImagesRequest {
    #[serde(alias = "bannerImage")]
    pub banner_image: Option<MediaRef>,
    pub icon: Option<MediaRef>,
}

#[derive(Deserialize)]
pub struct AddRuleRequest {
    pub title: String,
    pub description: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}
