//! Chat-platform models shared by handlers, repositories and adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message seen in (or posted to) a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Channel the message was posted in
    pub channel_id: String,
    /// Platform timestamp; unique per channel and sortable as a string of
    /// fixed-width seconds.micros.
    pub ts: String,
    /// Parent thread, `None` for top-level messages.
    pub thread_ts: Option<String>,
    /// Author; the assistant's name for its own messages
    pub user_id: String,
    /// Message body
    pub text: String,
    /// Posted by the assistant itself
    pub is_bot: bool,
    /// When the message was stored
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// The thread this message belongs to, treating a top-level message as
    /// the root of its own thread.
    pub fn thread_root(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

/// A channel in the workspace roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Platform channel id
    pub id: String,
    /// Channel name without `#`
    pub name: String,
    /// Whether the bot has joined the channel.
    pub is_member: bool,
    /// Archived on the platform
    pub is_archived: bool,
    /// Whether the bot may post in this channel without being mentioned.
    pub autonomous_enabled: bool,
    /// Last time the roster sync saw this channel
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Channel {
    /// A channel the assistant belongs to, not archived.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_member: true,
            is_archived: false,
            autonomous_enabled: false,
            last_synced_at: None,
        }
    }

    /// Active channels are the ones handlers iterate over.
    pub fn is_active(&self) -> bool {
        self.is_member && !self.is_archived
    }
}

/// A rolling summary of a channel's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    /// Memory id
    pub id: Uuid,
    /// Channel the memory summarizes
    pub channel_id: String,
    /// Model-written summary text
    pub summary: String,
    /// Timestamp of the newest message folded into this summary.
    pub covers_until_ts: String,
    /// Messages folded into this summary
    pub message_count: u32,
    /// When the memory was written
    pub created_at: DateTime<Utc>,
}

impl Memory {
    /// New memory stamped now.
    pub fn new(
        channel_id: impl Into<String>,
        summary: impl Into<String>,
        covers_until_ts: impl Into<String>,
        message_count: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id: channel_id.into(),
            summary: summary.into(),
            covers_until_ts: covers_until_ts.into(),
            message_count,
            created_at: Utc::now(),
        }
    }
}
