//! Concrete implementations of the pipeline's collaborator traits
pub mod notifiers;
pub mod redis;
pub mod targets;

pub use notifiers::{TelegramNotifier, WebhookNotifier};
pub use self::redis::{RedisStateStore, RedisStreamConsumer, RedisStreamPublisher};
pub use targets::HttpTargetSource;
