//! SQLite implementation of the ChannelRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{format_datetime, parse_optional_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Channel;
use crate::domain::ports::ChannelRepository;

/// `ChannelRepository` backed by the `channels` table.
pub struct SqliteChannelRepository {
    pool: SqlitePool,
}

impl SqliteChannelRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelRepository for SqliteChannelRepository {
    async fn upsert(&self, channel: &Channel) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO channels (id, name, is_member, is_archived, autonomous_enabled, last_synced_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   is_member = excluded.is_member,
                   is_archived = excluded.is_archived,
                   last_synced_at = excluded.last_synced_at"#
        )
        .bind(&channel.id)
        .bind(&channel.name)
        .bind(channel.is_member)
        .bind(channel.is_archived)
        .bind(channel.autonomous_enabled)
        .bind(channel.last_synced_at.map(format_datetime))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> DomainResult<Option<Channel>> {
        let row: Option<ChannelRow> = sqlx::query_as("SELECT * FROM channels WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Channel::try_from).transpose()
    }

    async fn list_all(&self) -> DomainResult<Vec<Channel>> {
        let rows: Vec<ChannelRow> = sqlx::query_as("SELECT * FROM channels ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Channel::try_from).collect()
    }

    async fn list_active(&self) -> DomainResult<Vec<Channel>> {
        let rows: Vec<ChannelRow> = sqlx::query_as(
            "SELECT * FROM channels WHERE is_member = 1 AND is_archived = 0 ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Channel::try_from).collect()
    }

    async fn set_autonomous(&self, id: &str, enabled: bool) -> DomainResult<()> {
        let result = sqlx::query("UPDATE channels SET autonomous_enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ChannelNotFound(id.to_string()));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ChannelRow {
    id: String,
    name: String,
    is_member: bool,
    is_archived: bool,
    autonomous_enabled: bool,
    last_synced_at: Option<String>,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = DomainError;

    fn try_from(row: ChannelRow) -> Result<Self, Self::Error> {
        Ok(Channel {
            last_synced_at: parse_optional_datetime(row.last_synced_at)?,
            id: row.id,
            name: row.name,
            is_member: row.is_member,
            is_archived: row.is_archived,
            autonomous_enabled: row.autonomous_enabled,
        })
    }
}
