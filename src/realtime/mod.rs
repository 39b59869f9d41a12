pub mod controller;
pub mod hub;
pub mod index;
pub mod model;
pub mod notifier;
pub mod session;

pub use hub::TopicHub;
pub use model::{ForumEvent, Topic};
pub use notifier::{FanoutNotifier, HubNotifier, InMemoryBus, Notifier, RedisNotifier};
