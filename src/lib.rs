//! Parlor - event coordination core for a chat assistant
//!
//! Parlor keeps a chat assistant's background work orderly. Inbound messages
//! and periodic ticks become [`Event`]s on a deduplicating [`EventQueue`];
//! a single [`EventLoop`] consumer hands each one to the handlers registered
//! with the [`EventDispatcher`], isolating handler failures from each other
//! and from the loop. An [`EventScheduler`] feeds the periodic ticks.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): events, chat models, configuration, ports
//! - **Service Layer** (`services`): the event core and the built-in handlers
//! - **Adapters** (`adapters`): SQLite storage and the Slack integration
//! - **Infrastructure Layer** (`infrastructure`): Claude client, config, logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use parlor::domain::models::{EventLoopConfig, EventType};
//! use parlor::services::{handler_fn, EventDispatcher, EventLoop, EventQueue};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let dispatcher = Arc::new(EventDispatcher::new());
//! dispatcher
//!     .register(
//!         EventType::Summary,
//!         Arc::new(handler_fn("log-summary", |event| async move {
//!             println!("summary tick {}", event.id());
//!             Ok(())
//!         })),
//!     )
//!     .await;
//!
//! let queue = EventQueue::new();
//! let event_loop = EventLoop::new(queue.clone(), dispatcher, &EventLoopConfig::default());
//! event_loop.start();
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DispatchError, DomainError, DomainResult};
pub use domain::models::{Config, Event, EventId, EventType, Payload};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    DispatchOutcome, EventDispatcher, EventHandler, EventLoop, EventQueue, EventScheduler,
};
