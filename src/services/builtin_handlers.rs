//! Built-in event handlers, one per event type.
//!
//! Tick handlers walk every active channel and keep going when a single
//! channel fails; the failure is logged with the channel id.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::event_dispatcher::EventHandler;
use super::response_service::ResponseService;
use super::summary_service::SummaryService;
use crate::domain::models::{AssistantConfig, Channel, ChatMessage, Event, EventType};
use crate::domain::ports::{ChannelRepository, ChatClient, MemoryRepository, MessageRepository};

/// Upper bound on messages folded into one summary run.
const SUMMARY_BATCH_LIMIT: u32 = 200;

/// Post `text` and record it as the assistant's own message.
async fn post_and_record(
    chat: &dyn ChatClient,
    messages: &dyn MessageRepository,
    assistant: &AssistantConfig,
    channel_id: &str,
    thread_ts: Option<&str>,
    text: &str,
) -> anyhow::Result<()> {
    let ts = chat
        .post_message(channel_id, thread_ts, text)
        .await
        .with_context(|| format!("posting to channel {channel_id} failed"))?;

    let posted = ChatMessage {
        channel_id: channel_id.to_string(),
        ts,
        thread_ts: thread_ts.map(str::to_string),
        user_id: assistant.name.clone(),
        text: text.to_string(),
        is_bot: true,
        created_at: Utc::now(),
    };
    messages.save(&posted).await?;
    Ok(())
}

// ============================================================================
// MessageHandler
// ============================================================================

/// Answers a conversation the assistant was addressed in.
pub struct MessageHandler {
    messages: Arc<dyn MessageRepository>,
    memories: Arc<dyn MemoryRepository>,
    chat: Arc<dyn ChatClient>,
    responses: Arc<ResponseService>,
    assistant: AssistantConfig,
}

impl MessageHandler {
    /// Handler over the given collaborators.
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        memories: Arc<dyn MemoryRepository>,
        chat: Arc<dyn ChatClient>,
        responses: Arc<ResponseService>,
        assistant: AssistantConfig,
    ) -> Self {
        Self {
            messages,
            memories,
            chat,
            responses,
            assistant,
        }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn name(&self) -> &str {
        "MessageHandler"
    }

    fn event_type(&self) -> Option<EventType> {
        Some(EventType::Message)
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        let channel_id = event
            .channel_id()
            .context("message event has no channel_id")?;
        let thread_ts = event.thread_ts();
        let limit = self.assistant.history_limit;

        let history = match thread_ts.as_deref() {
            Some(ts) => self.messages.recent_in_thread(&channel_id, ts, limit).await?,
            None => self.messages.recent_in_channel(&channel_id, limit).await?,
        };

        // Debounced bursts can leave the conversation already answered.
        match history.last() {
            None => {
                debug!(channel_id = %channel_id, "no history for message event; skipping");
                return Ok(());
            }
            Some(last) if last.is_bot => {
                debug!(channel_id = %channel_id, "conversation already answered; skipping");
                return Ok(());
            }
            Some(_) => {}
        }

        let memories = self
            .memories
            .list_for_channel(&channel_id, self.assistant.memory_limit)
            .await?;
        let reply = self.responses.generate_reply(&history, &memories).await?;
        if reply.is_empty() {
            warn!(channel_id = %channel_id, "model produced an empty reply; nothing posted");
            return Ok(());
        }

        post_and_record(
            self.chat.as_ref(),
            self.messages.as_ref(),
            &self.assistant,
            &channel_id,
            thread_ts.as_deref(),
            &reply,
        )
        .await?;
        info!(channel_id = %channel_id, thread_ts = ?thread_ts, "reply posted");
        Ok(())
    }
}

// ============================================================================
// AutonomousCheckHandler
// ============================================================================

/// Lets the assistant join conversations it was not addressed in, in
/// channels that opted in.
pub struct AutonomousCheckHandler {
    channels: Arc<dyn ChannelRepository>,
    messages: Arc<dyn MessageRepository>,
    memories: Arc<dyn MemoryRepository>,
    chat: Arc<dyn ChatClient>,
    responses: Arc<ResponseService>,
    assistant: AssistantConfig,
}

impl AutonomousCheckHandler {
    /// Handler over the given collaborators.
    pub fn new(
        channels: Arc<dyn ChannelRepository>,
        messages: Arc<dyn MessageRepository>,
        memories: Arc<dyn MemoryRepository>,
        chat: Arc<dyn ChatClient>,
        responses: Arc<ResponseService>,
        assistant: AssistantConfig,
    ) -> Self {
        Self {
            channels,
            messages,
            memories,
            chat,
            responses,
            assistant,
        }
    }

    /// Returns whether a message was posted.
    async fn check_channel(&self, channel: &Channel) -> anyhow::Result<bool> {
        let recent = self
            .messages
            .recent_in_channel(&channel.id, self.assistant.history_limit)
            .await?;

        let unanswered = recent.iter().rev().take_while(|m| !m.is_bot).count();
        if unanswered == 0 {
            return Ok(false);
        }

        let verdict = self.responses.judge(channel, &recent).await?;
        if !verdict.respond {
            return Ok(false);
        }

        let memories = self
            .memories
            .list_for_channel(&channel.id, self.assistant.memory_limit)
            .await?;
        let reply = self.responses.generate_reply(&recent, &memories).await?;
        if reply.is_empty() {
            return Ok(false);
        }

        post_and_record(
            self.chat.as_ref(),
            self.messages.as_ref(),
            &self.assistant,
            &channel.id,
            None,
            &reply,
        )
        .await?;
        info!(channel_id = %channel.id, reason = %verdict.reason, "autonomous reply posted");
        Ok(true)
    }
}

#[async_trait]
impl EventHandler for AutonomousCheckHandler {
    fn name(&self) -> &str {
        "AutonomousCheckHandler"
    }

    fn event_type(&self) -> Option<EventType> {
        Some(EventType::AutonomousCheck)
    }

    async fn handle(&self, _event: &Event) -> anyhow::Result<()> {
        let channels = self.channels.list_active().await?;
        let mut posted = 0usize;
        for channel in channels.iter().filter(|c| c.autonomous_enabled) {
            match self.check_channel(channel).await {
                Ok(true) => posted += 1,
                Ok(false) => {}
                Err(e) => warn!(channel_id = %channel.id, error = ?e, "autonomous check failed"),
            }
        }
        debug!(channels = channels.len(), posted, "autonomous check complete");
        Ok(())
    }
}

// ============================================================================
// SummaryHandler
// ============================================================================

/// Writes a new memory for channels with enough unsummarized messages.
pub struct SummaryHandler {
    channels: Arc<dyn ChannelRepository>,
    messages: Arc<dyn MessageRepository>,
    memories: Arc<dyn MemoryRepository>,
    summaries: Arc<SummaryService>,
    min_messages: u32,
}

impl SummaryHandler {
    /// Handler writing memories once `min_messages` accumulate.
    pub fn new(
        channels: Arc<dyn ChannelRepository>,
        messages: Arc<dyn MessageRepository>,
        memories: Arc<dyn MemoryRepository>,
        summaries: Arc<SummaryService>,
        min_messages: u32,
    ) -> Self {
        Self {
            channels,
            messages,
            memories,
            summaries,
            min_messages,
        }
    }

    /// Returns whether a memory was written.
    async fn summarize_channel(&self, channel: &Channel) -> anyhow::Result<bool> {
        let previous = self.memories.latest_for_channel(&channel.id).await?;
        let after = previous.as_ref().map(|m| m.covers_until_ts.as_str());

        let pending = self.messages.count_since(&channel.id, after).await?;
        if pending < self.min_messages {
            return Ok(false);
        }

        let batch = self
            .messages
            .since(&channel.id, after, SUMMARY_BATCH_LIMIT)
            .await?;
        let memory = self
            .summaries
            .summarize(channel, previous.as_ref(), &batch)
            .await?;
        self.memories.add(&memory).await?;
        info!(
            channel_id = %channel.id,
            messages = memory.message_count,
            covers_until_ts = %memory.covers_until_ts,
            "channel memory updated"
        );
        Ok(true)
    }
}

#[async_trait]
impl EventHandler for SummaryHandler {
    fn name(&self) -> &str {
        "SummaryHandler"
    }

    fn event_type(&self) -> Option<EventType> {
        Some(EventType::Summary)
    }

    async fn handle(&self, _event: &Event) -> anyhow::Result<()> {
        let channels = self.channels.list_active().await?;
        let mut written = 0usize;
        for channel in &channels {
            match self.summarize_channel(channel).await {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => warn!(channel_id = %channel.id, error = ?e, "summary failed"),
            }
        }
        debug!(channels = channels.len(), written, "summary run complete");
        Ok(())
    }
}

// ============================================================================
// ChannelSyncHandler
// ============================================================================

/// Mirrors the chat platform's channel roster into the local store.
///
/// Channels named in `autonomous_channels` (by id or name) are opted into
/// autonomous replies as they are synced. Opt-ins are never revoked here.
pub struct ChannelSyncHandler {
    chat: Arc<dyn ChatClient>,
    channels: Arc<dyn ChannelRepository>,
    autonomous_channels: HashSet<String>,
}

impl ChannelSyncHandler {
    /// Handler that mirrors the roster without opting any channel in.
    pub fn new(chat: Arc<dyn ChatClient>, channels: Arc<dyn ChannelRepository>) -> Self {
        Self {
            chat,
            channels,
            autonomous_channels: HashSet::new(),
        }
    }

    /// Opt the given channel ids or names into autonomous replies.
    #[must_use]
    pub fn with_autonomous_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.autonomous_channels = channels
            .into_iter()
            .map(|c| {
                let c: String = c.into();
                c.trim_start_matches('#').to_string()
            })
            .collect();
        self
    }

    fn wants_autonomous(&self, channel: &Channel) -> bool {
        self.autonomous_channels.contains(&channel.id) || self.autonomous_channels.contains(&channel.name)
    }
}

#[async_trait]
impl EventHandler for ChannelSyncHandler {
    fn name(&self) -> &str {
        "ChannelSyncHandler"
    }

    fn event_type(&self) -> Option<EventType> {
        Some(EventType::ChannelSync)
    }

    async fn handle(&self, _event: &Event) -> anyhow::Result<()> {
        let roster = self
            .chat
            .list_channels()
            .await
            .context("fetching channel roster failed")?;
        let now = Utc::now();

        let mut seen = HashSet::with_capacity(roster.len());
        let mut opted_in = 0usize;
        for mut channel in roster {
            channel.last_synced_at = Some(now);
            self.channels.upsert(&channel).await?;
            // Upserts keep the stored flag, so the opt-in is a separate write.
            if self.wants_autonomous(&channel) {
                self.channels.set_autonomous(&channel.id, true).await?;
                opted_in += 1;
            }
            seen.insert(channel.id);
        }

        let mut archived = 0usize;
        for mut stale in self.channels.list_all().await? {
            if seen.contains(&stale.id) || stale.is_archived {
                continue;
            }
            stale.is_archived = true;
            stale.last_synced_at = Some(now);
            self.channels.upsert(&stale).await?;
            archived += 1;
        }

        info!(synced = seen.len(), archived, opted_in, "channel roster synced");
        Ok(())
    }
}
