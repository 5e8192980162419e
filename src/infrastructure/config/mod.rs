//! Layered configuration for the assistant.
//!
//! Built-in defaults, then `.parlor/config.yaml`, then `.parlor/local.yaml`,
//! then `PARLOR_*` environment variables, merged with figment and validated
//! before anything starts.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
