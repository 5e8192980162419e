//! Channel memory storage port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Memory;

/// Storage for rolling channel summaries.
#[async_trait]
pub trait MemoryRepository: Send + Sync {
    /// Store a new memory.
    async fn add(&self, memory: &Memory) -> DomainResult<()>;

    /// The newest memory for a channel, if any.
    async fn latest_for_channel(&self, channel_id: &str) -> DomainResult<Option<Memory>>;

    /// Up to `limit` memories for a channel, newest first.
    async fn list_for_channel(&self, channel_id: &str, limit: u32) -> DomainResult<Vec<Memory>>;
}
