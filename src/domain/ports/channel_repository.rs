//! Channel storage port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Channel;

/// Storage for the channel roster.
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    /// Insert or update a channel. `autonomous_enabled` is owned locally and
    /// is preserved when the channel already exists.
    async fn upsert(&self, channel: &Channel) -> DomainResult<()>;

    /// Look up one channel.
    async fn get(&self, id: &str) -> DomainResult<Option<Channel>>;

    /// Every stored channel, active or not.
    async fn list_all(&self) -> DomainResult<Vec<Channel>>;

    /// Channels the bot is a member of and that are not archived.
    async fn list_active(&self) -> DomainResult<Vec<Channel>>;

    /// Toggle unprompted replies for a channel.
    async fn set_autonomous(&self, id: &str, enabled: bool) -> DomainResult<()>;
}
