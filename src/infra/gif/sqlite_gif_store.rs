// SQLite-backed GIF limits and banned GIF list.
//
// Tables:
// - gif_config: One row per (guild, channel); channel 0 holds the server-wide defaults
// - banned_gifs: One row per banned URL per guild

use crate::core::gif::{
    BannedGifStore, GifError, GifPolicy, GifPolicyStore, GifPolicyUpdate, SERVER_DEFAULTS_CHANNEL,
};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

fn storage_error(e: sqlx::Error) -> GifError {
    GifError::StorageError(e.to_string())
}

pub struct SqliteGifStore {
    pool: Pool<Sqlite>,
}

impl SqliteGifStore {
    /// Open (or create) the database at `database_url` and run migrations.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:");

        let path_str = database_url.trim_start_matches("sqlite://");
        if !in_memory && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect(&conn_str)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), GifError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS gif_config (
                guild_id INTEGER NOT NULL,
                channel_id INTEGER NOT NULL,
                gif_limit INTEGER NOT NULL,
                window_seconds INTEGER NOT NULL,
                enabled BOOLEAN NOT NULL,
                PRIMARY KEY (guild_id, channel_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS banned_gifs (
                guild_id INTEGER NOT NULL,
                gif_url TEXT NOT NULL,
                PRIMARY KEY (guild_id, gif_url)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    /// Create a channel's row from the server-wide defaults (or the built-in
    /// ones) unless it already exists. Atomic on the primary key.
    async fn ensure_channel(&self, community_id: u64, channel_id: u64) -> Result<(), GifError> {
        let defaults = GifPolicy::default();
        let result = sqlx::query(
            r#"
            INSERT INTO gif_config (guild_id, channel_id, gif_limit, window_seconds, enabled)
            SELECT ?1, ?2,
                COALESCE((SELECT gif_limit FROM gif_config WHERE guild_id = ?1 AND channel_id = ?3), ?4),
                COALESCE((SELECT window_seconds FROM gif_config WHERE guild_id = ?1 AND channel_id = ?3), ?5),
                COALESCE((SELECT enabled FROM gif_config WHERE guild_id = ?1 AND channel_id = ?3), ?6)
            WHERE true
            ON CONFLICT(guild_id, channel_id) DO NOTHING
            "#,
        )
        .bind(community_id as i64)
        .bind(channel_id as i64)
        .bind(SERVER_DEFAULTS_CHANNEL as i64)
        .bind(defaults.limit as i64)
        .bind(defaults.window_seconds as i64)
        .bind(defaults.enabled)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() > 0 {
            tracing::debug!(community_id, channel_id, "Materialized GIF limit for channel");
        }
        Ok(())
    }

    async fn fetch(&self, community_id: u64, channel_id: u64) -> Result<GifPolicy, GifError> {
        let row = sqlx::query(
            "SELECT gif_limit, window_seconds, enabled FROM gif_config WHERE guild_id = ? AND channel_id = ?",
        )
        .bind(community_id as i64)
        .bind(channel_id as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(GifPolicy {
            limit: row.get::<i64, _>("gif_limit") as u32,
            window_seconds: row.get::<i64, _>("window_seconds") as u64,
            enabled: row.get("enabled"),
        })
    }
}

#[async_trait]
impl GifPolicyStore for SqliteGifStore {
    async fn get_channel_policy(
        &self,
        community_id: u64,
        channel_id: u64,
    ) -> Result<GifPolicy, GifError> {
        self.ensure_channel(community_id, channel_id).await?;
        self.fetch(community_id, channel_id).await
    }

    async fn update_channel_policy(
        &self,
        community_id: u64,
        channel_id: u64,
        update: GifPolicyUpdate,
    ) -> Result<GifPolicy, GifError> {
        self.ensure_channel(community_id, channel_id).await?;

        sqlx::query(
            r#"
            UPDATE gif_config SET
                gif_limit = COALESCE(?, gif_limit),
                window_seconds = COALESCE(?, window_seconds),
                enabled = COALESCE(?, enabled)
            WHERE guild_id = ? AND channel_id = ?
            "#,
        )
        .bind(update.limit.map(|v| v as i64))
        .bind(update.window_seconds.map(|v| v as i64))
        .bind(update.enabled)
        .bind(community_id as i64)
        .bind(channel_id as i64)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        self.fetch(community_id, channel_id).await
    }

    async fn set_server_enabled(&self, community_id: u64, enabled: bool) -> Result<u64, GifError> {
        let defaults = GifPolicy::default();
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query(
            r#"
            INSERT INTO gif_config (guild_id, channel_id, gif_limit, window_seconds, enabled)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(guild_id, channel_id) DO UPDATE SET enabled = excluded.enabled
            "#,
        )
        .bind(community_id as i64)
        .bind(SERVER_DEFAULTS_CHANNEL as i64)
        .bind(defaults.limit as i64)
        .bind(defaults.window_seconds as i64)
        .bind(enabled)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        let result = sqlx::query(
            "UPDATE gif_config SET enabled = ? WHERE guild_id = ? AND channel_id != ?",
        )
        .bind(enabled)
        .bind(community_id as i64)
        .bind(SERVER_DEFAULTS_CHANNEL as i64)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        tx.commit().await.map_err(storage_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl BannedGifStore for SqliteGifStore {
    async fn ban(&self, community_id: u64, url: &str) -> Result<bool, GifError> {
        let result = sqlx::query(
            r#"
            INSERT INTO banned_gifs (guild_id, gif_url) VALUES (?, ?)
            ON CONFLICT(guild_id, gif_url) DO NOTHING
            "#,
        )
        .bind(community_id as i64)
        .bind(url)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn unban(&self, community_id: u64, url: &str) -> Result<bool, GifError> {
        let result = sqlx::query("DELETE FROM banned_gifs WHERE guild_id = ? AND gif_url = ?")
            .bind(community_id as i64)
            .bind(url)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn banned(&self, community_id: u64) -> Result<Vec<String>, GifError> {
        let rows = sqlx::query("SELECT gif_url FROM banned_gifs WHERE guild_id = ? ORDER BY rowid")
            .bind(community_id as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(rows.iter().map(|row| row.get("gif_url")).collect())
    }
}
