use std::sync::{Arc, Mutex, PoisonError};

use actix::Addr;

use crate::database::redis::RedisService;
use crate::realtime::hub::{Broadcast, TopicHub};
use crate::realtime::model::{ForumEvent, Topic};

/// Sink for change notifications.
///
/// `publish` is called after the state change has committed and must not
/// block the caller: delivery is at-most-once and a failed delivery is only
/// logged.
pub trait Notifier: Send + Sync {
    fn publish(&self, topic: &Topic, event: &ForumEvent);
}

/// Pushes events to the WebSocket sessions of this process.
pub struct HubNotifier {
    hub: Addr<TopicHub>,
}

impl HubNotifier {
    pub fn new(hub: Addr<TopicHub>) -> Self {
        HubNotifier { hub }
    }
}

impl Notifier for HubNotifier {
    fn publish(&self, topic: &Topic, event: &ForumEvent) {
        self.hub.do_send(Broadcast {
            topic: topic.to_string(),
            event: event.clone(),
        });
    }
}

/// Publishes events as JSON on the Redis channel `forum:<topic>`.
///
/// Publish-only: this process never subscribes, so the channels feed
/// external consumers. WebSocket clients are served by the local
/// `TopicHub`, which sees only events raised by this instance.
pub struct RedisNotifier {
    redis: RedisService,
}

impl RedisNotifier {
    pub fn new(redis: RedisService) -> Self {
        RedisNotifier { redis }
    }

    pub fn channel(topic: &Topic) -> String {
        format!("forum:{}", topic)
    }
}

impl Notifier for RedisNotifier {
    fn publish(&self, topic: &Topic, event: &ForumEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to encode event for {}: {}", topic, e);
                return;
            }
        };
        let channel = Self::channel(topic);
        let redis = self.redis.clone();

        actix_web::rt::spawn(async move {
            if let Err(e) = redis.publish(&channel, &payload).await {
                log::warn!("Dropped event on {}: {}", channel, e);
            }
        });
    }
}

/// Forwards every event to several sinks.
#[derive(Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl Notifier for FanoutNotifier {
    fn publish(&self, topic: &Topic, event: &ForumEvent) {
        for sink in &self.sinks {
            sink.publish(topic, event);
        }
    }
}

/// Records published events in order.
#[derive(Default)]
pub struct InMemoryBus {
    events: Mutex<Vec<(Topic, ForumEvent)>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Topic, ForumEvent)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drains the recorded events.
    pub fn take(&self) -> Vec<(Topic, ForumEvent)> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn on_topic(&self, topic: &Topic) -> Vec<ForumEvent> {
        self.events()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, event)| event)
            .collect()
    }
}

impl Notifier for InMemoryBus {
    fn publish(&self, topic: &Topic, event: &ForumEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((*topic, event.clone()));
    }
}
