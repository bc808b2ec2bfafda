//! Error types for bridge-ledger.

/// Ledger layer errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Content already recorded (unique constraint violation).
    ///
    /// Expected under concurrent writers; callers treat this as idempotent
    /// success, not a fatal error.
    #[error("content already recorded: {content_hash}")]
    DuplicateFingerprint {
        /// Fingerprint of the content that was already present.
        content_hash: String,
    },

    /// A stored row could not be decoded.
    #[error("corrupt ledger row: {reason}")]
    CorruptRow {
        /// Why the row failed to decode.
        reason: String,
    },
}

impl LedgerError {
    /// True for the expected duplicate-insert outcome.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateFingerprint { .. })
    }
}

/// Result type alias for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
