//! # bridge-ledger
//!
//! Durable content-fingerprint ledger for postbridge.
//!
//! The ledger is the single source of truth shared by both sync directions:
//! one immutable row per post ever propagated, keyed by content fingerprint
//! and by `(platform, native id)`. The unique constraint on the fingerprint
//! column is the system-wide loop-prevention mechanism — a post written
//! Mastodon→Bluesky becomes a row whose fingerprint exists, so the reverse
//! pass sees the mirrored content and never writes it back.
//!
//! Rows are append-only; there is no update or delete path.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
mod sqlite;

pub use error::{LedgerError, LedgerResult};
pub use sqlite::SqliteLedger;

use async_trait::async_trait;
use bridge_types::{Platform, SyncedPost};

/// Request to record one propagated post.
///
/// The content hash is derived internally from `original_text`; callers
/// never supply it.
#[derive(Debug, Clone)]
pub struct NewSyncedPost {
    /// Platform the post originated on.
    pub source_platform: Platform,
    /// Platform the post was written to.
    pub target_platform: Platform,
    /// Native id on the source platform, if known.
    pub source_native_id: Option<String>,
    /// Native id assigned by the target platform, if known.
    pub target_native_id: Option<String>,
    /// The post text as originally fetched.
    pub original_text: String,
}

/// One member of a thread batch, in root-first order.
#[derive(Debug, Clone)]
pub struct ThreadEntry {
    /// Native id on the source platform.
    pub source_native_id: Option<String>,
    /// Native id assigned by the target platform.
    pub target_native_id: Option<String>,
    /// The post text as originally fetched.
    pub original_text: String,
}

/// Trait for sync ledger backends.
///
/// All reads are local and fast; none of these operations suspend on
/// network I/O.
#[async_trait]
pub trait SyncLedger: Send + Sync {
    /// Whether a candidate post still needs to be propagated.
    ///
    /// Returns `false` if the content fingerprint is already recorded or
    /// the `(source_platform, source_native_id)` pair is already recorded.
    /// Pure read; a pre-check only — the unique constraint enforced by
    /// [`record`](Self::record) is the authoritative race guard.
    async fn should_sync(
        &self,
        text: &str,
        source_platform: Platform,
        source_native_id: &str,
    ) -> LedgerResult<bool>;

    /// Insert one immutable row.
    ///
    /// Fails with [`LedgerError::DuplicateFingerprint`] if the content is
    /// already recorded (a race with a concurrent writer); callers treat
    /// that as idempotent success.
    ///
    /// `record` never writes thread columns. Thread rows are created
    /// exclusively through [`record_thread`](Self::record_thread), which
    /// assigns the thread id and contiguous positions as one batch; a row
    /// inserted here always has `thread_id = NULL`.
    async fn record(&self, post: NewSyncedPost) -> LedgerResult<()>;

    /// Insert all rows for a thread as a single atomic unit.
    ///
    /// Assigns `thread_position = index` in input order. All-or-nothing: a
    /// partially visible thread is never observable by readers.
    async fn record_thread(
        &self,
        entries: Vec<ThreadEntry>,
        source_platform: Platform,
        target_platform: Platform,
        thread_id: &str,
    ) -> LedgerResult<()>;

    /// Whether any rows exist for the given thread id.
    async fn is_thread_recorded(&self, thread_id: &str) -> LedgerResult<bool>;

    /// Fetch the row with the given content hash, if any.
    async fn lookup_by_fingerprint(&self, hash: &str) -> LedgerResult<Option<SyncedPost>>;

    /// Fetch all rows of a thread, ordered by position.
    async fn get_thread(&self, thread_id: &str) -> LedgerResult<Vec<SyncedPost>>;

    /// Total number of rows ever recorded.
    async fn synced_count(&self) -> LedgerResult<u64>;
}
