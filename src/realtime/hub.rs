use actix::prelude::*;
use std::collections::{HashMap, HashSet};

use crate::realtime::model::{ForumEvent, ServerMessage};

/// Message sent to the hub to register a session
#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub session_id: String,
    pub user_id: Option<String>,
    pub addr: Recipient<WsMessage>,
}

/// Message sent to the hub when a session disconnects
#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub session_id: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub session_id: String,
    pub topic: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub session_id: String,
    pub topic: String,
}

/// Event fan-out to every session subscribed to `topic`
#[derive(Message)]
#[rtype(result = "()")]
pub struct Broadcast {
    pub topic: String,
    pub event: ForumEvent,
}

/// Number of sessions currently subscribed to a topic
#[derive(Message)]
#[rtype(result = "usize")]
pub struct TopicSize {
    pub topic: String,
}

/// WebSocket message wrapper
#[derive(Message)]
#[rtype(result = "()")]
pub struct WsMessage(pub String);

/// Topic hub actor - tracks sessions and their subscriptions
#[derive(Default)]
pub struct TopicHub {
    /// Map of session_id -> session address
    sessions: HashMap<String, Recipient<WsMessage>>,
    /// Map of topic -> set of session_ids
    topics: HashMap<String, HashSet<String>>,
}

impl TopicHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn send_to_session(&self, session_id: &str, message: &ServerMessage) {
        if let Some(addr) = self.sessions.get(session_id) {
            match serde_json::to_string(message) {
                Ok(json) => {
                    let _ = addr.do_send(WsMessage(json));
                }
                Err(e) => log::error!("Failed to encode message for {}: {}", session_id, e),
            }
        }
    }

    fn send_to_topic(&self, topic: &str, message: &ServerMessage) {
        let Some(subscribers) = self.topics.get(topic) else {
            return;
        };
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to encode event for {}: {}", topic, e);
                return;
            }
        };
        for session_id in subscribers {
            if let Some(addr) = self.sessions.get(session_id) {
                let _ = addr.do_send(WsMessage(json.clone()));
            }
        }
    }
}

impl Actor for TopicHub {
    type Context = Context<Self>;
}

impl Handler<Connect> for TopicHub {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        log::info!(
            "Session {} connected (user {})",
            msg.session_id,
            msg.user_id.as_deref().unwrap_or("anonymous")
        );

        self.sessions.insert(msg.session_id.clone(), msg.addr);
        self.send_to_session(
            &msg.session_id,
            &ServerMessage::Connected {
                session_id: msg.session_id.clone(),
                user_id: msg.user_id,
            },
        );
    }
}

impl Handler<Disconnect> for TopicHub {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        log::info!("Session {} disconnected", msg.session_id);

        self.sessions.remove(&msg.session_id);
        self.topics.retain(|_, subscribers| {
            subscribers.remove(&msg.session_id);
            !subscribers.is_empty()
        });
    }
}

impl Handler<Subscribe> for TopicHub {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _: &mut Context<Self>) {
        log::debug!("Session {} subscribing to {}", msg.session_id, msg.topic);

        self.topics
            .entry(msg.topic.clone())
            .or_default()
            .insert(msg.session_id.clone());
        self.send_to_session(&msg.session_id, &ServerMessage::Subscribed { topic: msg.topic });
    }
}

impl Handler<Unsubscribe> for TopicHub {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _: &mut Context<Self>) {
        log::debug!("Session {} unsubscribing from {}", msg.session_id, msg.topic);

        if let Some(subscribers) = self.topics.get_mut(&msg.topic) {
            subscribers.remove(&msg.session_id);
            if subscribers.is_empty() {
                self.topics.remove(&msg.topic);
            }
        }
        self.send_to_session(&msg.session_id, &ServerMessage::Unsubscribed { topic: msg.topic });
    }
}

impl Handler<Broadcast> for TopicHub {
    type Result = ();

    fn handle(&mut self, msg: Broadcast, _: &mut Context<Self>) {
        let message = ServerMessage::Event {
            topic: msg.topic.clone(),
            payload: msg.event,
        };
        self.send_to_topic(&msg.topic, &message);
    }
}

impl Handler<TopicSize> for TopicHub {
    type Result = usize;

    fn handle(&mut self, msg: TopicSize, _: &mut Context<Self>) -> usize {
        self.topics.get(&msg.topic).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Stands in for a WebSocket session and records what the hub sends it.
    struct Recorder {
        received: Arc<Mutex<Vec<String>>>,
    }

    impl Actor for Recorder {
        type Context = Context<Self>;
    }

    impl Handler<WsMessage> for Recorder {
        type Result = ();

        fn handle(&mut self, msg: WsMessage, _: &mut Context<Self>) {
            self.received.lock().unwrap().push(msg.0);
        }
    }

    fn vote_event() -> ForumEvent {
        ForumEvent::VoteChanged {
            entity_id: "p1".into(),
            entity_kind: crate::vote::model::VoteTarget::Post,
            upvotes: 1,
            downvotes: 0,
            caller_vote: Some(crate::vote::model::VoteType::Up),
        }
    }

    #[actix_web::test]
    async fn only_subscribers_receive_topic_events() {
        let hub = TopicHub::new().start();
        let inbox_a = Arc::new(Mutex::new(Vec::new()));
        let inbox_b = Arc::new(Mutex::new(Vec::new()));
        let a = Recorder { received: inbox_a.clone() }.start();
        let b = Recorder { received: inbox_b.clone() }.start();

        for (id, addr) in [("a", a.recipient()), ("b", b.recipient())] {
            hub.send(Connect {
                session_id: id.into(),
                user_id: None,
                addr,
            })
            .await
            .unwrap();
        }
        hub.send(Subscribe {
            session_id: "a".into(),
            topic: "post:1".into(),
        })
        .await
        .unwrap();
        hub.send(Broadcast {
            topic: "post:1".into(),
            event: vote_event(),
        })
        .await
        .unwrap();
        assert_eq!(hub.send(TopicSize { topic: "post:1".into() }).await.unwrap(), 1);

        // Let the recorders drain their mailboxes.
        actix_web::rt::time::sleep(std::time::Duration::from_millis(50)).await;

        let a_seen = inbox_a.lock().unwrap().clone();
        let b_seen = inbox_b.lock().unwrap().clone();
        assert!(a_seen.iter().any(|m| m.contains("\"voteChanged\"")));
        assert!(b_seen.iter().all(|m| !m.contains("\"voteChanged\"")));
    }

    #[actix_web::test]
    async fn disconnect_drops_subscriptions() {
        let hub = TopicHub::new().start();
        let recorder = Recorder {
            received: Arc::new(Mutex::new(Vec::new())),
        }
        .start();

        hub.send(Connect {
            session_id: "s".into(),
            user_id: Some("u".into()),
            addr: recorder.recipient(),
        })
        .await
        .unwrap();
        hub.send(Subscribe {
            session_id: "s".into(),
            topic: "community:1".into(),
        })
        .await
        .unwrap();
        hub.send(Disconnect { session_id: "s".into() }).await.unwrap();

        assert_eq!(
            hub.send(TopicSize { topic: "community:1".into() }).await.unwrap(),
            0
        );
    }
}
