// SQLite-backed policy store for persistent anti-spam configuration.
//
// Tables:
// - spam_policy: One row per guild

use crate::core::moderation::{CommunityPolicy, PolicyError, PolicyStore, PolicyUpdate};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

fn storage_error(e: sqlx::Error) -> PolicyError {
    PolicyError::StorageError(e.to_string())
}

pub struct SqlitePolicyStore {
    pool: Pool<Sqlite>,
}

impl SqlitePolicyStore {
    /// Open (or create) the database at `database_url` and run migrations.
    ///
    /// Accepts a plain file path, a `sqlite:` URL, or `sqlite::memory:`.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:");

        // Ensure the file exists if it's a file path
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

        // Every connection to :memory: is its own database, so keep just one.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect(&conn_str)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), PolicyError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS spam_policy (
                guild_id INTEGER PRIMARY KEY,
                repetition_threshold INTEGER NOT NULL,
                window_seconds INTEGER NOT NULL,
                spread_threshold INTEGER NOT NULL,
                enabled BOOLEAN NOT NULL,
                notify_channel_id INTEGER,
                escalation_role_id INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    /// Insert the default row for a guild unless one already exists.
    ///
    /// The primary key makes this atomic: racing callers all end up reading
    /// the single row that won.
    async fn ensure_row(&self, community_id: u64) -> Result<(), PolicyError> {
        let defaults = CommunityPolicy::default();
        let result = sqlx::query(
            r#"
            INSERT INTO spam_policy (
                guild_id, repetition_threshold, window_seconds, spread_threshold,
                enabled, notify_channel_id, escalation_role_id
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(guild_id) DO NOTHING
            "#,
        )
        .bind(community_id as i64)
        .bind(defaults.repetition_threshold as i64)
        .bind(defaults.window_seconds as i64)
        .bind(defaults.spread_threshold as i64)
        .bind(defaults.enabled)
        .bind(defaults.notify_target.map(|id| id as i64))
        .bind(defaults.escalation_role.map(|id| id as i64))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() > 0 {
            tracing::debug!(community_id, "Materialized default anti-spam policy");
        }
        Ok(())
    }

    async fn fetch(&self, community_id: u64) -> Result<CommunityPolicy, PolicyError> {
        let row = sqlx::query("SELECT * FROM spam_policy WHERE guild_id = ?")
            .bind(community_id as i64)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(policy_from_row(&row))
    }
}

fn policy_from_row(row: &SqliteRow) -> CommunityPolicy {
    CommunityPolicy {
        repetition_threshold: row.get::<i64, _>("repetition_threshold") as u32,
        window_seconds: row.get::<i64, _>("window_seconds") as u64,
        spread_threshold: row.get::<i64, _>("spread_threshold") as u32,
        enabled: row.get("enabled"),
        notify_target: row
            .get::<Option<i64>, _>("notify_channel_id")
            .map(|id| id as u64),
        escalation_role: row
            .get::<Option<i64>, _>("escalation_role_id")
            .map(|id| id as u64),
    }
}

#[async_trait]
impl PolicyStore for SqlitePolicyStore {
    async fn get_policy(&self, community_id: u64) -> Result<CommunityPolicy, PolicyError> {
        self.ensure_row(community_id).await?;
        self.fetch(community_id).await
    }

    async fn update_policy(
        &self,
        community_id: u64,
        update: PolicyUpdate,
    ) -> Result<CommunityPolicy, PolicyError> {
        self.ensure_row(community_id).await?;

        // One statement so concurrent updates to different fields don't
        // overwrite each other. Each nullable column takes a "set?" flag
        // followed by the new value.
        sqlx::query(
            r#"
            UPDATE spam_policy SET
                repetition_threshold = COALESCE(?, repetition_threshold),
                window_seconds = COALESCE(?, window_seconds),
                spread_threshold = COALESCE(?, spread_threshold),
                enabled = COALESCE(?, enabled),
                notify_channel_id = CASE WHEN ? THEN ? ELSE notify_channel_id END,
                escalation_role_id = CASE WHEN ? THEN ? ELSE escalation_role_id END
            WHERE guild_id = ?
            "#,
        )
        .bind(update.repetition_threshold.map(|v| v as i64))
        .bind(update.window_seconds.map(|v| v as i64))
        .bind(update.spread_threshold.map(|v| v as i64))
        .bind(update.enabled)
        .bind(update.notify_target.is_some())
        .bind(update.notify_target.flatten().map(|id| id as i64))
        .bind(update.escalation_role.is_some())
        .bind(update.escalation_role.flatten().map(|id| id as i64))
        .bind(community_id as i64)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        self.fetch(community_id).await
    }
}
