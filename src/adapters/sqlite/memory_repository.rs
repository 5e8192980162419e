//! SQLite implementation of the MemoryRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Memory;
use crate::domain::ports::MemoryRepository;

/// `MemoryRepository` backed by the `memories` table.
#[derive(Clone)]
pub struct SqliteMemoryRepository {
    pool: SqlitePool,
}

impl SqliteMemoryRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemoryRepository for SqliteMemoryRepository {
    async fn add(&self, memory: &Memory) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO memories (id, channel_id, summary, covers_until_ts, message_count, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#
        )
        .bind(memory.id.to_string())
        .bind(&memory.channel_id)
        .bind(&memory.summary)
        .bind(&memory.covers_until_ts)
        .bind(i64::from(memory.message_count))
        .bind(format_datetime(memory.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_for_channel(&self, channel_id: &str) -> DomainResult<Option<Memory>> {
        // Memories are append-only, so insertion order is recency.
        let row: Option<MemoryRow> = sqlx::query_as(
            "SELECT * FROM memories WHERE channel_id = ? ORDER BY rowid DESC LIMIT 1",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Memory::try_from).transpose()
    }

    async fn list_for_channel(&self, channel_id: &str, limit: u32) -> DomainResult<Vec<Memory>> {
        let rows: Vec<MemoryRow> = sqlx::query_as(
            "SELECT * FROM memories WHERE channel_id = ? ORDER BY rowid DESC LIMIT ?",
        )
        .bind(channel_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Memory::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct MemoryRow {
    id: String,
    channel_id: String,
    summary: String,
    covers_until_ts: String,
    message_count: i64,
    created_at: String,
}

impl TryFrom<MemoryRow> for Memory {
    type Error = DomainError;

    fn try_from(row: MemoryRow) -> Result<Self, Self::Error> {
        let message_count = u32::try_from(row.message_count)
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        Ok(Memory {
            id: parse_uuid(&row.id)?,
            created_at: parse_datetime(&row.created_at)?,
            channel_id: row.channel_id,
            summary: row.summary,
            covers_until_ts: row.covers_until_ts,
            message_count,
        })
    }
}
