//! Adapters for external systems: SQLite storage and the Slack platform.

pub mod slack;
pub mod sqlite;
