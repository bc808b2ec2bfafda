//! SQLite backend for the sync ledger.

use crate::error::{LedgerError, LedgerResult};
use crate::{NewSyncedPost, SyncLedger, ThreadEntry};
use async_trait::async_trait;
use bridge_types::fingerprint::fingerprint;
use bridge_types::{Platform, SyncedPost};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// SQLite-based sync ledger.
///
/// Uses WAL mode for concurrent reads/writes. The unique index on
/// `content_hash` is the authoritative dedup guard; `should_sync` is only a
/// pre-check.
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Create a new SQLite ledger from a database path.
    ///
    /// Creates the database file if it doesn't exist.
    pub async fn new(path: &Path) -> LedgerResult<Self> {
        let options = SqliteConnectOptions::from_str(path.to_str().unwrap_or("bridge.db"))
            .map_err(LedgerError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(LedgerError::Database)?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    /// Create an in-memory SQLite ledger (for testing).
    pub async fn in_memory() -> LedgerResult<Self> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(LedgerError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(LedgerError::Database)?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> LedgerResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS synced_posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_platform TEXT NOT NULL,
                target_platform TEXT NOT NULL,
                source_native_id TEXT,
                target_native_id TEXT,
                content_hash TEXT NOT NULL UNIQUE,
                thread_id TEXT,
                thread_position INTEGER,
                original_text TEXT NOT NULL,
                synced_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(LedgerError::Database)?;

        // Rows with NULL source_native_id are exempt per SQLite semantics
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_synced_source
            ON synced_posts(source_platform, source_native_id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(LedgerError::Database)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_synced_thread ON synced_posts(thread_id)")
            .execute(&self.pool)
            .await
            .map_err(LedgerError::Database)?;

        Ok(())
    }

    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    /// Map an insert failure, folding unique violations into the expected
    /// duplicate outcome.
    fn map_insert_error(err: sqlx::Error, content_hash: &str) -> LedgerError {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                LedgerError::DuplicateFingerprint {
                    content_hash: content_hash.to_string(),
                }
            }
            other => LedgerError::Database(other),
        }
    }
}

#[async_trait]
impl SyncLedger for SqliteLedger {
    async fn should_sync(
        &self,
        text: &str,
        source_platform: Platform,
        source_native_id: &str,
    ) -> LedgerResult<bool> {
        let hash = fingerprint(text);

        let known: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM synced_posts
                WHERE content_hash = ?1
                   OR (source_platform = ?2 AND source_native_id = ?3)
            )
            "#,
        )
        .bind(&hash)
        .bind(source_platform.as_str())
        .bind(source_native_id)
        .fetch_one(&self.pool)
        .await
        .map_err(LedgerError::Database)?;

        Ok(known == 0)
    }

    async fn record(&self, post: NewSyncedPost) -> LedgerResult<()> {
        let hash = fingerprint(&post.original_text);
        let now = Self::current_timestamp();

        sqlx::query(
            r#"
            INSERT INTO synced_posts
                (source_platform, target_platform, source_native_id, target_native_id,
                 content_hash, thread_id, thread_position, original_text, synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6, ?7)
            "#,
        )
        .bind(post.source_platform.as_str())
        .bind(post.target_platform.as_str())
        .bind(&post.source_native_id)
        .bind(&post.target_native_id)
        .bind(&hash)
        .bind(&post.original_text)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error(e, &hash))?;

        tracing::debug!(content_hash = %hash, "ledger row recorded");
        Ok(())
    }

    async fn record_thread(
        &self,
        entries: Vec<ThreadEntry>,
        source_platform: Platform,
        target_platform: Platform,
        thread_id: &str,
    ) -> LedgerResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let now = Self::current_timestamp();

        // Single transaction: a partially visible thread is never observable
        let mut tx = self.pool.begin().await.map_err(LedgerError::Database)?;

        for (position, entry) in entries.iter().enumerate() {
            let hash = fingerprint(&entry.original_text);

            sqlx::query(
                r#"
                INSERT INTO synced_posts
                    (source_platform, target_platform, source_native_id, target_native_id,
                     content_hash, thread_id, thread_position, original_text, synced_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(source_platform.as_str())
            .bind(target_platform.as_str())
            .bind(&entry.source_native_id)
            .bind(&entry.target_native_id)
            .bind(&hash)
            .bind(thread_id)
            .bind(position as i64)
            .bind(&entry.original_text)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| Self::map_insert_error(e, &hash))?;
        }

        tx.commit().await.map_err(LedgerError::Database)?;

        tracing::debug!(thread_id, posts = entries.len(), "thread recorded");
        Ok(())
    }

    async fn is_thread_recorded(&self, thread_id: &str) -> LedgerResult<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM synced_posts WHERE thread_id = ?1)",
        )
        .bind(thread_id)
        .fetch_one(&self.pool)
        .await
        .map_err(LedgerError::Database)?;

        Ok(exists != 0)
    }

    async fn lookup_by_fingerprint(&self, hash: &str) -> LedgerResult<Option<SyncedPost>> {
        let row = sqlx::query_as::<_, SyncedPostRow>(
            r#"
            SELECT source_platform, target_platform, source_native_id, target_native_id,
                   content_hash, thread_id, thread_position, original_text, synced_at
            FROM synced_posts
            WHERE content_hash = ?1
            "#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(LedgerError::Database)?;

        match row {
            Some(r) => Ok(Some(r.try_into()?)),
            None => Ok(None),
        }
    }

    async fn get_thread(&self, thread_id: &str) -> LedgerResult<Vec<SyncedPost>> {
        let rows = sqlx::query_as::<_, SyncedPostRow>(
            r#"
            SELECT source_platform, target_platform, source_native_id, target_native_id,
                   content_hash, thread_id, thread_position, original_text, synced_at
            FROM synced_posts
            WHERE thread_id = ?1
            ORDER BY thread_position ASC
            "#,
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await
        .map_err(LedgerError::Database)?;

        rows.into_iter().map(|row| row.try_into()).collect()
    }

    async fn synced_count(&self) -> LedgerResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM synced_posts")
            .fetch_one(&self.pool)
            .await
            .map_err(LedgerError::Database)?;

        Ok(count as u64)
    }
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct SyncedPostRow {
    source_platform: String,
    target_platform: String,
    source_native_id: Option<String>,
    target_native_id: Option<String>,
    content_hash: String,
    thread_id: Option<String>,
    thread_position: Option<i64>,
    original_text: String,
    synced_at: i64,
}

impl TryFrom<SyncedPostRow> for SyncedPost {
    type Error = LedgerError;

    fn try_from(row: SyncedPostRow) -> Result<Self, Self::Error> {
        let parse = |value: &str| {
            Platform::from_str(value).map_err(|e| LedgerError::CorruptRow {
                reason: e.to_string(),
            })
        };

        Ok(SyncedPost {
            source_platform: parse(&row.source_platform)?,
            target_platform: parse(&row.target_platform)?,
            source_native_id: row.source_native_id,
            target_native_id: row.target_native_id,
            content_hash: row.content_hash,
            thread_id: row.thread_id,
            thread_position: row.thread_position.map(|p| p as u32),
            original_text: row.original_text,
            synced_at: row.synced_at,
        })
    }
}
