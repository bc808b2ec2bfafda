//! Platform, direction and post value types for postbridge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two bridged platforms.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Mastodon (ActivityPub).
    Mastodon,
    /// Bluesky (AT Protocol).
    Bluesky,
}

impl Platform {
    /// The platform on the other side of the bridge.
    pub fn other(&self) -> Self {
        match self {
            Self::Mastodon => Self::Bluesky,
            Self::Bluesky => Self::Mastodon,
        }
    }

    /// Stable lowercase name, used in ledger rows and thread ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mastodon => "mastodon",
            Self::Bluesky => "bluesky",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mastodon" => Ok(Self::Mastodon),
            "bluesky" => Ok(Self::Bluesky),
            other => Err(PlatformParseError {
                value: other.to_string(),
            }),
        }
    }
}

/// Error parsing a platform name from storage.
#[derive(Debug, thiserror::Error)]
#[error("unknown platform: {value}")]
pub struct PlatformParseError {
    /// The unrecognized platform name.
    pub value: String,
}

/// One one-way synchronization pass.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Mastodon posts propagate to Bluesky.
    MastodonToBluesky,
    /// Bluesky posts propagate to Mastodon.
    BlueskyToMastodon,
}

impl Direction {
    /// The platform candidates are fetched from.
    pub fn source(&self) -> Platform {
        match self {
            Self::MastodonToBluesky => Platform::Mastodon,
            Self::BlueskyToMastodon => Platform::Bluesky,
        }
    }

    /// The platform posts are written to.
    pub fn target(&self) -> Platform {
        self.source().other()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source(), self.target())
    }
}

impl fmt::Debug for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The canonical post shape the sync core manipulates.
///
/// Platform readers adapt their native objects into this; nothing downstream
/// ever sees a platform library type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Platform-native post identifier.
    pub native_id: String,
    /// Raw post text as fetched.
    pub text: String,
    /// Account handle of the post author.
    pub author: String,
    /// Native id of the post this one replies to, if any.
    pub reply_parent_id: Option<String>,
    /// Unix timestamp of post creation.
    pub created_at: i64,
}

impl Post {
    /// Whether this post is part of a reply chain.
    pub fn is_reply(&self) -> bool {
        self.reply_parent_id.is_some()
    }
}

/// One ledger row: a post that has been propagated across the bridge.
///
/// Rows are immutable and append-only; `content_hash` is globally unique
/// across the table and is the system-wide loop-prevention mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedPost {
    /// Platform the post originated on.
    pub source_platform: Platform,
    /// Platform the post was written to.
    pub target_platform: Platform,
    /// Native id on the source platform, if known.
    pub source_native_id: Option<String>,
    /// Native id assigned by the target platform, if known.
    pub target_native_id: Option<String>,
    /// 64-char lower-hex fingerprint of the normalized text.
    pub content_hash: String,
    /// `"{source_platform}_{root_native_id}"` for thread members.
    pub thread_id: Option<String>,
    /// 0-indexed rank within the thread; contiguous per thread_id.
    pub thread_position: Option<u32>,
    /// The post text as originally fetched.
    pub original_text: String,
    /// Unix timestamp the row was recorded.
    pub synced_at: i64,
}

/// Structured outcome of one `sync(direction)` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Number of posts written to the target and recorded.
    pub synced: u32,
    /// Number of candidates skipped as already known.
    pub skipped: u32,
    /// Per-candidate failure descriptions; never aborts the batch.
    pub errors: Vec<String>,
}

impl SyncReport {
    /// True if every candidate either synced or skipped cleanly.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "synced={} skipped={} errors={}",
            self.synced,
            self.skipped,
            self.errors.len()
        )
    }
}
