use std::fmt;
use std::str::FromStr;

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::comment::model::Comment;
use crate::community::model::MembershipState;
use crate::utils::error::ForumError;
use crate::vote::model::{VoteTarget, VoteType};

/// Address of a stream of events: one per post, one per community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Post(ObjectId),
    Community(ObjectId),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Topic::Post(id) => write!(f, "post:{}", id.to_hex()),
            Topic::Community(id) => write!(f, "community:{}", id.to_hex()),
        }
    }
}

impl FromStr for Topic {
    type Err = ForumError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || ForumError::InvalidArgument(format!("Unknown topic: {}", raw));
        let (kind, id) = raw.split_once(':').ok_or_else(invalid)?;
        let id = ObjectId::parse_str(id).map_err(|_| invalid())?;
        match kind {
            "post" => Ok(Topic::Post(id)),
            "community" => Ok(Topic::Community(id)),
            _ => Err(invalid()),
        }
    }
}

/// Change notification pushed to subscribers after a state change commits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ForumEvent {
    VoteChanged {
        entity_id: String,
        entity_kind: VoteTarget,
        upvotes: i64,
        downvotes: i64,
        caller_vote: Option<VoteType>,
    },
    CommentCreated {
        post_id: String,
        comment: Comment,
    },
    CommentUpdated {
        post_id: String,
        comment: Comment,
    },
    CommentDeleted {
        post_id: String,
        comment_id: String,
    },
    MembershipChanged {
        community_id: String,
        user_id: String,
        new_state: MembershipState,
    },
}

/// WebSocket message from client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Ping,
}

/// WebSocket message to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        session_id: String,
        user_id: Option<String>,
    },
    Subscribed {
        topic: String,
    },
    Unsubscribed {
        topic: String,
    },
    Event {
        topic: String,
        payload: ForumEvent,
    },
    Error {
        message: String,
    },
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn topics_round_trip_through_their_wire_form() {
        let id = ObjectId::new();
        let topic = Topic::Post(id);
        assert_eq!(topic.to_string(), format!("post:{}", id.to_hex()));
        assert_eq!(topic.to_string().parse::<Topic>().unwrap(), topic);
        assert_eq!(
            format!("community:{}", id.to_hex()).parse::<Topic>().unwrap(),
            Topic::Community(id)
        );
    }

    #[test]
    fn malformed_topics_are_rejected() {
        for raw in ["post", "post:nope", "thread:507f1f77bcf86cd799439011", ""] {
            assert!(matches!(raw.parse::<Topic>(), Err(ForumError::InvalidArgument(_))));
        }
    }

    #[test]
    fn vote_events_use_camel_case_on_the_wire() {
        let event = ForumEvent::VoteChanged {
            entity_id: "abc".into(),
            entity_kind: VoteTarget::Comment,
            upvotes: 3,
            downvotes: 1,
            caller_vote: None,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "voteChanged",
                "entityId": "abc",
                "entityKind": "comment",
                "upvotes": 3,
                "downvotes": 1,
                "callerVote": null,
            })
        );
    }

    #[test]
    fn client_messages_are_tagged_by_type() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","topic":"post:1"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { topic } if topic == "post:1"));
        assert!(matches!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ping
        ));
    }
}
