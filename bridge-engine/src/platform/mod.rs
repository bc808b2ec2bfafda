//! Platform collaborator abstraction.
//!
//! The core never talks to a platform library directly. Each side of the
//! bridge provides one [`PlatformReader`] and one [`PlatformWriter`]; their
//! adapters map native post objects into the canonical
//! [`Post`](bridge_types::Post) shape, so the core only ever manipulates one
//! shape.
//!
//! Authentication, session handling and target-side text adaptation
//! (length limits, link shortening) live inside the collaborator
//! implementations, behind these traits.

mod mock;

pub use mock::{MockPlatform, WrittenPost};

use async_trait::async_trait;
use bridge_types::Post;
use thiserror::Error;

/// Platform read/write errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Network or rate-limit failure; safe to retry.
    #[error("transient platform error: {0}")]
    Transient(String),

    /// The platform rejected the request; retrying will not help.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl PlatformError {
    /// Whether the write retry policy applies to this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Read access to one platform.
#[async_trait]
pub trait PlatformReader: Send + Sync {
    /// Fetch up to `limit` recent posts by `author`, newest first.
    async fn fetch_recent(&self, author: &str, limit: u32) -> Result<Vec<Post>, PlatformError>;

    /// Fetch a single post by native id.
    ///
    /// Returns `Ok(None)` if the post does not exist (deleted, wrong id).
    async fn fetch_by_id(&self, id: &str) -> Result<Option<Post>, PlatformError>;
}

/// Write access to one platform.
///
/// Implementations adapt text for the target platform (length limits,
/// mention rewriting) before emitting.
#[async_trait]
pub trait PlatformWriter: Send + Sync {
    /// Publish a standalone post; returns the new native id.
    async fn post(&self, text: &str) -> Result<String, PlatformError>;

    /// Publish a reply to `parent_native_id`; returns the new native id.
    async fn reply(&self, text: &str, parent_native_id: &str) -> Result<String, PlatformError>;
}
