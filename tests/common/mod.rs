//! Common test utilities for integration tests
//!
//! In-memory implementations of the storage and platform ports, plus a
//! scripted LLM, so handlers and the event core can be exercised without
//! SQLite or network access.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use parlor::domain::errors::{DomainError, DomainResult};
use parlor::domain::models::{Channel, ChatMessage, Memory};
use parlor::domain::ports::{
    ChannelRepository, ChatClient, CompletionRequest, LlmClient, MemoryRepository,
    MessageRepository,
};

/// Setup test logging
///
/// Initializes a tracing subscriber that writes through the test harness.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Log lines captured by [`capture_logs`].
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route this thread's events into a buffer until the guard drops.
///
/// Only sees events emitted on the current thread, which is where a
/// `#[tokio::test]` body runs.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .with_writer(move || writer.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

/// Poll `predicate` every 10ms until it holds or `timeout_ms` elapses.
pub async fn wait_for<F>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

pub fn human(channel_id: &str, ts: &str, thread_ts: Option<&str>, text: &str) -> ChatMessage {
    ChatMessage {
        channel_id: channel_id.to_string(),
        ts: ts.to_string(),
        thread_ts: thread_ts.map(str::to_string),
        user_id: "U_HUMAN".to_string(),
        text: text.to_string(),
        is_bot: false,
        created_at: Utc::now(),
    }
}

pub fn bot(channel_id: &str, ts: &str, thread_ts: Option<&str>, text: &str) -> ChatMessage {
    ChatMessage {
        user_id: "Parlor".to_string(),
        is_bot: true,
        ..human(channel_id, ts, thread_ts, text)
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Default)]
pub struct InMemoryMessages {
    messages: Mutex<Vec<ChatMessage>>,
}

impl InMemoryMessages {
    pub fn all(&self) -> Vec<ChatMessage> {
        let mut all = self.messages.lock().unwrap().clone();
        all.sort_by(|a, b| a.ts.cmp(&b.ts));
        all
    }

    fn newest(&self, limit: u32, keep: impl Fn(&ChatMessage) -> bool) -> Vec<ChatMessage> {
        let matching: Vec<ChatMessage> = self.all().into_iter().filter(|m| keep(m)).collect();
        let skip = matching.len().saturating_sub(limit as usize);
        matching.into_iter().skip(skip).collect()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessages {
    async fn save(&self, message: &ChatMessage) -> DomainResult<()> {
        let mut messages = self.messages.lock().unwrap();
        let duplicate = messages
            .iter()
            .any(|m| m.channel_id == message.channel_id && m.ts == message.ts);
        if !duplicate {
            messages.push(message.clone());
        }
        Ok(())
    }

    async fn recent_in_thread(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
    ) -> DomainResult<Vec<ChatMessage>> {
        Ok(self.newest(limit, |m| {
            m.channel_id == channel_id
                && (m.ts == thread_ts || m.thread_ts.as_deref() == Some(thread_ts))
        }))
    }

    async fn recent_in_channel(
        &self,
        channel_id: &str,
        limit: u32,
    ) -> DomainResult<Vec<ChatMessage>> {
        Ok(self.newest(limit, |m| m.channel_id == channel_id && m.thread_ts.is_none()))
    }

    async fn since(
        &self,
        channel_id: &str,
        after_ts: Option<&str>,
        limit: u32,
    ) -> DomainResult<Vec<ChatMessage>> {
        Ok(self
            .all()
            .into_iter()
            .filter(|m| m.channel_id == channel_id && after_ts.map_or(true, |a| m.ts.as_str() > a))
            .take(limit as usize)
            .collect())
    }

    async fn count_since(&self, channel_id: &str, after_ts: Option<&str>) -> DomainResult<u32> {
        let count = self
            .all()
            .iter()
            .filter(|m| m.channel_id == channel_id && after_ts.map_or(true, |a| m.ts.as_str() > a))
            .count();
        Ok(u32::try_from(count).unwrap())
    }
}

// ============================================================================
// Channels
// ============================================================================

#[derive(Default)]
pub struct InMemoryChannels {
    channels: Mutex<BTreeMap<String, Channel>>,
}

impl InMemoryChannels {
    pub fn with(channels: impl IntoIterator<Item = Channel>) -> Self {
        Self {
            channels: Mutex::new(channels.into_iter().map(|c| (c.id.clone(), c)).collect()),
        }
    }

    pub fn snapshot(&self, id: &str) -> Option<Channel> {
        self.channels.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl ChannelRepository for InMemoryChannels {
    async fn upsert(&self, channel: &Channel) -> DomainResult<()> {
        let mut channels = self.channels.lock().unwrap();
        let mut stored = channel.clone();
        if let Some(existing) = channels.get(&channel.id) {
            stored.autonomous_enabled = existing.autonomous_enabled;
        }
        channels.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn get(&self, id: &str) -> DomainResult<Option<Channel>> {
        Ok(self.snapshot(id))
    }

    async fn list_all(&self) -> DomainResult<Vec<Channel>> {
        Ok(self.channels.lock().unwrap().values().cloned().collect())
    }

    async fn list_active(&self) -> DomainResult<Vec<Channel>> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.is_active())
            .cloned()
            .collect())
    }

    async fn set_autonomous(&self, id: &str, enabled: bool) -> DomainResult<()> {
        let mut channels = self.channels.lock().unwrap();
        let channel = channels
            .get_mut(id)
            .ok_or_else(|| DomainError::ChannelNotFound(id.to_string()))?;
        channel.autonomous_enabled = enabled;
        Ok(())
    }
}

// ============================================================================
// Memories
// ============================================================================

#[derive(Default)]
pub struct InMemoryMemories {
    memories: Mutex<Vec<Memory>>,
}

impl InMemoryMemories {
    pub fn all(&self) -> Vec<Memory> {
        self.memories.lock().unwrap().clone()
    }
}

#[async_trait]
impl MemoryRepository for InMemoryMemories {
    async fn add(&self, memory: &Memory) -> DomainResult<()> {
        self.memories.lock().unwrap().push(memory.clone());
        Ok(())
    }

    async fn latest_for_channel(&self, channel_id: &str) -> DomainResult<Option<Memory>> {
        Ok(self
            .all()
            .into_iter()
            .rev()
            .find(|m| m.channel_id == channel_id))
    }

    async fn list_for_channel(&self, channel_id: &str, limit: u32) -> DomainResult<Vec<Memory>> {
        Ok(self
            .all()
            .into_iter()
            .rev()
            .filter(|m| m.channel_id == channel_id)
            .take(limit as usize)
            .collect())
    }
}

// ============================================================================
// Chat platform
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub channel_id: String,
    pub thread_ts: Option<String>,
    pub text: String,
}

/// Records posts and serves a fixed roster.
#[derive(Default)]
pub struct RecordingChat {
    posts: Mutex<Vec<Post>>,
    roster: Mutex<Vec<Channel>>,
    failing_channels: Mutex<HashSet<String>>,
    roster_unavailable: Mutex<bool>,
    next_ts: AtomicU32,
}

impl RecordingChat {
    pub fn with_roster(roster: Vec<Channel>) -> Self {
        Self {
            roster: Mutex::new(roster),
            ..Self::default()
        }
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }

    pub fn fail_posts_to(&self, channel_id: &str) {
        self.failing_channels
            .lock()
            .unwrap()
            .insert(channel_id.to_string());
    }

    pub fn set_roster_unavailable(&self) {
        *self.roster_unavailable.lock().unwrap() = true;
    }
}

#[async_trait]
impl ChatClient for RecordingChat {
    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<String> {
        if self.failing_channels.lock().unwrap().contains(channel_id) {
            return Err(anyhow!("channel_not_found"));
        }
        self.posts.lock().unwrap().push(Post {
            channel_id: channel_id.to_string(),
            thread_ts: thread_ts.map(str::to_string),
            text: text.to_string(),
        });
        let n = self.next_ts.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("1900000000.{n:06}"))
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        if *self.roster_unavailable.lock().unwrap() {
            return Err(anyhow!("ratelimited"));
        }
        Ok(self.roster.lock().unwrap().clone())
    }
}

// ============================================================================
// LLM
// ============================================================================

/// Answers by prompt kind: judge prompts get `verdict`, summary prompts get
/// `summary`, everything else gets `reply`.
pub struct ScriptedLlm {
    pub reply: String,
    pub verdict: String,
    pub summary: String,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new(reply: &str, verdict: &str, summary: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            verdict: verdict.to_string(),
            summary: summary.to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(reply: &str) -> Arc<Self> {
        Self::new(reply, r#"{"respond": false, "reason": "quiet"}"#, "summary")
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let system = request.system.clone().unwrap_or_default();
        self.requests.lock().unwrap().push(request);
        if system.contains("should speak up") {
            Ok(self.verdict.clone())
        } else if system.contains("running memory") {
            Ok(self.summary.clone())
        } else {
            Ok(self.reply.clone())
        }
    }
}
