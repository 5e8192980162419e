//! SQLite implementation of the MessageRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{format_datetime, parse_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ChatMessage;
use crate::domain::ports::MessageRepository;

/// `MessageRepository` backed by the `messages` table.
pub struct SqliteMessageRepository {
    pool: SqlitePool,
}

impl SqliteMessageRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for SqliteMessageRepository {
    async fn save(&self, message: &ChatMessage) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT OR IGNORE INTO messages (channel_id, ts, thread_ts, user_id, text, is_bot, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(&message.channel_id)
        .bind(&message.ts)
        .bind(&message.thread_ts)
        .bind(&message.user_id)
        .bind(&message.text)
        .bind(message.is_bot)
        .bind(format_datetime(message.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_in_thread(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: u32,
    ) -> DomainResult<Vec<ChatMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"SELECT * FROM (
                   SELECT * FROM messages
                   WHERE channel_id = ? AND (ts = ? OR thread_ts = ?)
                   ORDER BY ts DESC LIMIT ?
               ) ORDER BY ts ASC"#
        )
        .bind(channel_id)
        .bind(thread_ts)
        .bind(thread_ts)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    async fn recent_in_channel(&self, channel_id: &str, limit: u32) -> DomainResult<Vec<ChatMessage>> {
        // Top-level messages only; thread replies belong to their thread.
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"SELECT * FROM (
                   SELECT * FROM messages
                   WHERE channel_id = ? AND thread_ts IS NULL
                   ORDER BY ts DESC LIMIT ?
               ) ORDER BY ts ASC"#
        )
        .bind(channel_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    async fn since(
        &self,
        channel_id: &str,
        after_ts: Option<&str>,
        limit: u32,
    ) -> DomainResult<Vec<ChatMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"SELECT * FROM messages
               WHERE channel_id = ? AND (? IS NULL OR ts > ?)
               ORDER BY ts ASC LIMIT ?"#
        )
        .bind(channel_id)
        .bind(after_ts)
        .bind(after_ts)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    async fn count_since(&self, channel_id: &str, after_ts: Option<&str>) -> DomainResult<u32> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages WHERE channel_id = ? AND (? IS NULL OR ts > ?)",
        )
        .bind(channel_id)
        .bind(after_ts)
        .bind(after_ts)
        .fetch_one(&self.pool)
        .await?;

        u32::try_from(count).map_err(|e| DomainError::SerializationError(e.to_string()))
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    channel_id: String,
    ts: String,
    thread_ts: Option<String>,
    user_id: String,
    text: String,
    is_bot: bool,
    created_at: String,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = DomainError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(ChatMessage {
            created_at: parse_datetime(&row.created_at)?,
            channel_id: row.channel_id,
            ts: row.ts,
            thread_ts: row.thread_ts,
            user_id: row.user_id,
            text: row.text,
            is_bot: row.is_bot,
        })
    }
}
