//! Domain layer for the Parlor assistant
//!
//! Models, errors, and the port traits implemented by adapters.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DispatchError, DomainError, DomainResult};
