//! Metadata store trait and SQLite implementation.

use crate::error::MetadataResult;
use crate::repos::{AccessTokenRepo, ShareRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: ShareRepo + AccessTokenRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and migrate it.
    pub async fn new(
        path: impl AsRef<Path>,
        busy_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let busy_timeout = Duration::from_secs(busy_timeout_secs.unwrap_or(5));

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        // One connection serializes writers; every mutation is a single
        // conditional statement or a short transaction.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!(path = %path.display(), "SQLite metadata store ready");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::error::MetadataError;
    use crate::models::*;
    use sharebox_core::ShareStatus;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl ShareRepo for SqliteStore {
        async fn create_share(&self, share: &ShareRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO shares (
                    share_id, original_filename, size_bytes, owner_tag, tier, status,
                    created_at, expires_at, max_downloads, download_count,
                    storage_key, salt, iv
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(share.share_id)
            .bind(&share.original_filename)
            .bind(share.size_bytes)
            .bind(&share.owner_tag)
            .bind(&share.tier)
            .bind(&share.status)
            .bind(share.created_at)
            .bind(share.expires_at)
            .bind(share.max_downloads)
            .bind(share.download_count)
            .bind(&share.storage_key)
            .bind(&share.salt)
            .bind(&share.iv)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::from_write(e, format!("share {}", share.share_id)))?;
            Ok(())
        }

        async fn get_share(&self, share_id: Uuid) -> MetadataResult<Option<ShareRow>> {
            let row = sqlx::query_as::<_, ShareRow>("SELECT * FROM shares WHERE share_id = ?")
                .bind(share_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn claim_download(
            &self,
            share_id: Uuid,
            now: OffsetDateTime,
        ) -> MetadataResult<Option<ShareRow>> {
            // SET expressions see the pre-update row.
            let row = sqlx::query_as::<_, ShareRow>(
                r#"
                UPDATE shares
                SET download_count = download_count + 1,
                    status = CASE
                        WHEN max_downloads IS NOT NULL AND download_count + 1 >= max_downloads
                        THEN 'limit_reached'
                        ELSE status
                    END
                WHERE share_id = ?
                  AND expires_at > ?
                  AND (max_downloads IS NULL OR download_count < max_downloads)
                RETURNING *
                "#,
            )
            .bind(share_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn mark_share_status(
            &self,
            share_id: Uuid,
            status: ShareStatus,
        ) -> MetadataResult<bool> {
            let result =
                sqlx::query("UPDATE shares SET status = ? WHERE share_id = ? AND status = 'active'")
                    .bind(status.as_str())
                    .bind(share_id)
                    .execute(&self.pool)
                    .await?;
            Ok(result.rows_affected() > 0)
        }

        async fn delete_share(&self, share_id: Uuid) -> MetadataResult<bool> {
            let mut tx = self.pool.begin().await?;

            sqlx::query("DELETE FROM access_tokens WHERE share_id = ?")
                .bind(share_id)
                .execute(&mut *tx)
                .await?;

            let deleted = sqlx::query("DELETE FROM shares WHERE share_id = ?")
                .bind(share_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            tx.commit().await?;
            Ok(deleted > 0)
        }

        async fn list_dead_shares(
            &self,
            now: OffsetDateTime,
            limit: u32,
        ) -> MetadataResult<Vec<ShareRow>> {
            let rows = sqlx::query_as::<_, ShareRow>(
                r#"
                SELECT * FROM shares
                WHERE expires_at <= ?
                   OR (max_downloads IS NOT NULL AND download_count >= max_downloads)
                ORDER BY expires_at ASC
                LIMIT ?
                "#,
            )
            .bind(now)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_shares(&self) -> MetadataResult<Vec<ShareRow>> {
            let rows = sqlx::query_as::<_, ShareRow>(
                "SELECT * FROM shares ORDER BY created_at DESC, rowid DESC",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl AccessTokenRepo for SqliteStore {
        async fn create_access_token(&self, token: &AccessTokenRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO access_tokens (token_hash, share_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&token.token_hash)
            .bind(token.share_id)
            .bind(token.expires_at)
            .bind(token.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::from_write(e, format!("share {}", token.share_id)))?;
            Ok(())
        }

        async fn get_access_token(
            &self,
            token_hash: &str,
        ) -> MetadataResult<Option<AccessTokenRow>> {
            let row = sqlx::query_as::<_, AccessTokenRow>(
                "SELECT * FROM access_tokens WHERE token_hash = ?",
            )
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn redeem_access_token(
            &self,
            token_hash: &str,
            share_id: Uuid,
            now: OffsetDateTime,
        ) -> MetadataResult<bool> {
            let redeemed: Option<String> = sqlx::query_scalar(
                r#"
                DELETE FROM access_tokens
                WHERE token_hash = ? AND share_id = ? AND expires_at > ?
                RETURNING token_hash
                "#,
            )
            .bind(token_hash)
            .bind(share_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

            if redeemed.is_some() {
                return Ok(true);
            }

            let expired = sqlx::query(
                "DELETE FROM access_tokens WHERE token_hash = ? AND expires_at <= ?",
            )
            .bind(token_hash)
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();
            if expired > 0 {
                tracing::debug!(share_id = %share_id, "Removed expired access token on lookup");
            }
            Ok(false)
        }

        async fn purge_expired_access_tokens(&self, now: OffsetDateTime) -> MetadataResult<u64> {
            let result = sqlx::query("DELETE FROM access_tokens WHERE expires_at <= ?")
                .bind(now)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected())
        }
    }
}

/// SQL schema for SQLite.
///
/// Timestamps are RFC 3339 text in whole UTC seconds, so text comparison
/// orders them correctly.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS shares (
    share_id BLOB PRIMARY KEY,
    original_filename TEXT NOT NULL,
    size_bytes INTEGER NOT NULL CHECK (size_bytes >= 0),
    owner_tag TEXT,
    tier TEXT NOT NULL CHECK (tier IN ('FREE', 'PRO')),
    status TEXT NOT NULL DEFAULT 'active'
        CHECK (status IN ('active', 'expired', 'limit_reached')),
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    max_downloads INTEGER CHECK (max_downloads IS NULL OR max_downloads > 0),
    download_count INTEGER NOT NULL DEFAULT 0 CHECK (download_count >= 0),
    storage_key TEXT NOT NULL,
    salt TEXT NOT NULL,
    iv TEXT NOT NULL,
    CHECK (expires_at > created_at),
    CHECK (max_downloads IS NULL OR download_count <= max_downloads)
);
CREATE INDEX IF NOT EXISTS idx_shares_expires_at ON shares(expires_at);
CREATE INDEX IF NOT EXISTS idx_shares_created_at ON shares(created_at);

CREATE TABLE IF NOT EXISTS access_tokens (
    token_hash TEXT PRIMARY KEY,
    share_id BLOB NOT NULL REFERENCES shares(share_id) ON DELETE CASCADE,
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_access_tokens_share ON access_tokens(share_id);
CREATE INDEX IF NOT EXISTS idx_access_tokens_expires_at ON access_tokens(expires_at);
"#;
