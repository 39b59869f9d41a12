use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::utils::error::ForumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Up,
    Down,
}

impl VoteType {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteType::Up => "up",
            VoteType::Down => "down",
        }
    }
}

impl FromStr for VoteType {
    type Err = ForumError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "up" => Ok(VoteType::Up),
            "down" => Ok(VoteType::Down),
            _ => Err(ForumError::InvalidArgument(
                "Invalid vote type, expected \"up\" or \"down\"".to_string(),
            )),
        }
    }
}

/// One user's vote on a post or comment. At most one per user and entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voter {
    pub user_id: ObjectId,
    pub vote_type: VoteType,
    pub voted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteTarget {
    Post,
    Comment,
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VoteTarget::Post => write!(f, "Post"),
            VoteTarget::Comment => write!(f, "Comment"),
        }
    }
}

/// Anything carrying a voter set with its two derived counters.
pub trait Votable {
    fn voters(&self) -> &[Voter];
    fn voters_mut(&mut self) -> &mut Vec<Voter>;
    fn set_tally(&mut self, upvotes: i64, downvotes: i64);
    /// Post whose topic receives this entity's vote events.
    fn topic_post_id(&self) -> ObjectId;

    fn vote_of(&self, user_id: &ObjectId) -> Option<VoteType> {
        self.voters()
            .iter()
            .find(|v| v.user_id == *user_id)
            .map(|v| v.vote_type)
    }
}

/// State of a votable entity right after a toggle.
#[derive(Debug, Clone)]
pub struct VoteTally {
    pub entity_id: ObjectId,
    pub post_id: ObjectId,
    pub upvotes: i64,
    pub downvotes: i64,
    pub voters: Vec<Voter>,
}

impl VoteTally {
    pub fn from_entity<V: Votable>(entity_id: ObjectId, entity: &V, upvotes: i64, downvotes: i64) -> Self {
        Self {
            entity_id,
            post_id: entity.topic_post_id(),
            upvotes,
            downvotes,
            voters: entity.voters().to_vec(),
        }
    }

    pub fn vote_of(&self, user_id: &ObjectId) -> Option<VoteType> {
        self.voters
            .iter()
            .find(|v| v.user_id == *user_id)
            .map(|v| v.vote_type)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub entity_id: ObjectId,
    pub target: VoteTarget,
    pub upvotes: i64,
    pub downvotes: i64,
    pub user_vote: Option<VoteType>,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    #[serde(alias = "voteType")]
    pub vote_type: String,
}
