//! Message storage port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::ChatMessage;

/// Storage for chat messages seen by the assistant.
///
/// All list methods return messages oldest first.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert a message, ignoring duplicates of the same channel + ts.
    async fn save(&self, message: &ChatMessage) -> DomainResult<()>;

    /// The most recent `limit` messages of a thread, root included.
    async fn recent_in_thread(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
    ) -> DomainResult<Vec<ChatMessage>>;

    /// The most recent `limit` messages of a channel.
    async fn recent_in_channel(&self, channel_id: &str, limit: u32)
        -> DomainResult<Vec<ChatMessage>>;

    /// Up to `limit` messages strictly newer than `after_ts` (all when `None`).
    async fn since(
        &self,
        channel_id: &str,
        after_ts: Option<&str>,
        limit: u32,
    ) -> DomainResult<Vec<ChatMessage>>;

    /// Number of messages strictly newer than `after_ts` (all when `None`).
    async fn count_since(&self, channel_id: &str, after_ts: Option<&str>) -> DomainResult<u32>;
}
