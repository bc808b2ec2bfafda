//! Mock platform for testing.
//!
//! Implements both [`PlatformReader`] and [`PlatformWriter`] over shared
//! in-memory state: seeded timelines, captured writes, and fault injection
//! switches.

use super::{PlatformError, PlatformReader, PlatformWriter};
use async_trait::async_trait;
use bridge_types::Post;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A post captured by the mock writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenPost {
    /// Native id the mock assigned.
    pub id: String,
    /// Text as written.
    pub text: String,
    /// Reply parent, if the write was a reply.
    pub parent: Option<String>,
}

/// Mock platform for testing.
///
/// Writes are reflected back into the timeline under the mock's own
/// account, so a reverse sync pass observes mirrored content the way a real
/// platform would.
#[derive(Debug)]
pub struct MockPlatform {
    inner: Arc<Mutex<MockPlatformInner>>,
}

#[derive(Debug)]
struct MockPlatformInner {
    account: String,
    timeline: Vec<Post>,
    posts_by_id: HashMap<String, Post>,
    written: Vec<WrittenPost>,
    next_id: u64,
    fetch_delay: Option<Duration>,
    fail_next_fetch_recent: Option<String>,
    fail_next_fetch_by_id: Option<String>,
    failing_writes: u32,
    write_failure: String,
}

impl MockPlatform {
    /// Create a mock platform whose writes are authored by `account`.
    pub fn new(account: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockPlatformInner {
                account: account.to_string(),
                timeline: Vec::new(),
                posts_by_id: HashMap::new(),
                written: Vec::new(),
                next_id: 9000,
                fetch_delay: None,
                fail_next_fetch_recent: None,
                fail_next_fetch_by_id: None,
                failing_writes: 0,
                write_failure: String::new(),
            })),
        }
    }

    /// Seed a post into the timeline.
    pub fn add_post(&self, post: Post) {
        let mut inner = self.inner.lock().unwrap();
        inner.posts_by_id.insert(post.native_id.clone(), post.clone());
        inner.timeline.push(post);
    }

    /// All posts captured by the writer, in write order.
    pub fn written_posts(&self) -> Vec<WrittenPost> {
        let inner = self.inner.lock().unwrap();
        inner.written.clone()
    }

    /// Delay every fetch by the given duration (simulated latency).
    pub fn set_fetch_delay(&self, delay: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.fetch_delay = Some(delay);
    }

    /// Cause the next `fetch_recent()` to fail with the given error.
    pub fn fail_next_fetch_recent(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_fetch_recent = Some(error.to_string());
    }

    /// Cause the next `fetch_by_id()` to fail with the given error.
    pub fn fail_next_fetch_by_id(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_fetch_by_id = Some(error.to_string());
    }

    /// Cause the next `count` write attempts to fail transiently.
    pub fn fail_writes(&self, count: u32, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.failing_writes = count;
        inner.write_failure = error.to_string();
    }

    fn write(&self, text: &str, parent: Option<&str>) -> Result<String, PlatformError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(PlatformError::Transient(inner.write_failure.clone()));
        }

        let id = inner.next_id.to_string();
        inner.next_id += 1;

        let post = Post {
            native_id: id.clone(),
            text: text.to_string(),
            author: inner.account.clone(),
            reply_parent_id: parent.map(str::to_string),
            created_at: inner.next_id as i64,
        };
        inner.posts_by_id.insert(id.clone(), post.clone());
        inner.timeline.push(post);

        inner.written.push(WrittenPost {
            id: id.clone(),
            text: text.to_string(),
            parent: parent.map(str::to_string),
        });

        Ok(id)
    }

    async fn simulate_latency(&self) {
        let delay = {
            let inner = self.inner.lock().unwrap();
            inner.fetch_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Clone for MockPlatform {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl PlatformReader for MockPlatform {
    async fn fetch_recent(&self, author: &str, limit: u32) -> Result<Vec<Post>, PlatformError> {
        self.simulate_latency().await;

        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_fetch_recent.take() {
            return Err(PlatformError::Transient(error));
        }

        let mut posts: Vec<Post> = inner
            .timeline
            .iter()
            .filter(|p| p.author == author)
            .cloned()
            .collect();
        // Newest first, the way platform timelines page
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Post>, PlatformError> {
        self.simulate_latency().await;

        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_fetch_by_id.take() {
            return Err(PlatformError::Transient(error));
        }

        Ok(inner.posts_by_id.get(id).cloned())
    }
}

#[async_trait]
impl PlatformWriter for MockPlatform {
    async fn post(&self, text: &str) -> Result<String, PlatformError> {
        self.write(text, None)
    }

    async fn reply(&self, text: &str, parent_native_id: &str) -> Result<String, PlatformError> {
        self.write(text, Some(parent_native_id))
    }
}
