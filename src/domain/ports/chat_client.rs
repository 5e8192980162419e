//! Chat platform port.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::models::Channel;

/// Chat platform operations used by handlers.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Post `text` to a channel, inside `thread_ts` when given.
    ///
    /// Returns the platform timestamp of the posted message.
    async fn post_message(&self, channel_id: &str, thread_ts: Option<&str>, text: &str)
        -> Result<String>;

    /// Fetch the full channel roster visible to the bot.
    async fn list_channels(&self) -> Result<Vec<Channel>>;
}
