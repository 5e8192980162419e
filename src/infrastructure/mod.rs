//! Infrastructure layer module
//!
//! Cross-cutting plumbing that the services and adapters sit on:
//! - Claude Messages API client (the `LlmClient` implementation)
//! - Configuration management
//! - Logging infrastructure

pub mod claude;
pub mod config;
pub mod logging;
