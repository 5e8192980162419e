//! Domain models: events, chat records and configuration.

pub mod chat;
pub mod config;
pub mod event;

pub use chat::{Channel, ChatMessage, Memory};
pub use config::{
    AssistantConfig, Config, DatabaseConfig, EventLoopConfig, LlmConfig, LoggingConfig,
    QueueConfig, SchedulerConfig, SlackConfig,
};
pub use event::{Event, EventId, EventType, Payload};
