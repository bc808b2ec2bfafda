//! Rate-limited gateway to one platform.
//!
//! All outbound traffic for a platform flows through its [`Gateway`]: reads
//! go through a sliding-window limiter, writes additionally get bounded
//! exponential-backoff retry. The limiter sleeps rather than rejects —
//! platform rate limits are a pacing concern here, not an admission
//! decision.
//!
//! Built on `tokio::time` so tests drive the clock with `start_paused`.

use crate::config::LimitsConfig;
use crate::platform::{PlatformError, PlatformReader, PlatformWriter};
use bridge_types::Post;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Sliding-window request limiter for one operation class.
///
/// Tracks the timestamps of recent requests; a request may proceed while
/// fewer than `max_requests` fall inside the trailing window. Stale
/// timestamps are pruned on each check.
#[derive(Debug)]
pub struct SlidingWindow {
    max_requests: u32,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl SlidingWindow {
    /// Create a limiter allowing `max_requests` per `window`.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether a request may proceed right now.
    pub fn can_proceed(&mut self) -> bool {
        self.prune(Instant::now());
        (self.timestamps.len() as u32) < self.max_requests
    }

    /// Record that a request was made.
    pub fn record_request(&mut self) {
        self.timestamps.push_back(Instant::now());
    }

    /// Time until the next request may proceed; zero if one may proceed now.
    pub fn wait_time(&mut self) -> Duration {
        let now = Instant::now();
        self.prune(now);
        if (self.timestamps.len() as u32) < self.max_requests {
            return Duration::ZERO;
        }
        match self.timestamps.front() {
            Some(&oldest) => (oldest + self.window).duration_since(now),
            None => Duration::ZERO,
        }
    }
}

/// Rate-limited access to one platform's reader and writer.
pub struct Gateway {
    reader: Arc<dyn PlatformReader>,
    writer: Arc<dyn PlatformWriter>,
    read_limiter: Mutex<SlidingWindow>,
    write_limiter: Mutex<SlidingWindow>,
    max_retries: u32,
    base_delay: Duration,
}

impl Gateway {
    /// Wrap a platform's collaborators with the configured limits.
    pub fn new(
        reader: Arc<dyn PlatformReader>,
        writer: Arc<dyn PlatformWriter>,
        limits: &LimitsConfig,
    ) -> Self {
        Self {
            reader,
            writer,
            read_limiter: Mutex::new(SlidingWindow::new(
                limits.read_requests,
                Duration::from_secs(limits.read_window_secs),
            )),
            write_limiter: Mutex::new(SlidingWindow::new(
                limits.write_requests,
                Duration::from_secs(limits.write_window_secs),
            )),
            max_retries: limits.max_retries,
            base_delay: limits.base_delay(),
        }
    }

    /// Sleep until the limiter admits a request, then record it.
    async fn acquire(limiter: &Mutex<SlidingWindow>) {
        loop {
            let wait = {
                let mut window = limiter.lock().unwrap();
                if window.can_proceed() {
                    window.record_request();
                    return;
                }
                window.wait_time()
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Fetch up to `limit` recent posts by `author` through the read limiter.
    pub async fn fetch_recent(&self, author: &str, limit: u32) -> Result<Vec<Post>, PlatformError> {
        Self::acquire(&self.read_limiter).await;
        self.reader.fetch_recent(author, limit).await
    }

    /// Fetch one post by native id through the read limiter.
    pub async fn fetch_by_id(&self, id: &str) -> Result<Option<Post>, PlatformError> {
        Self::acquire(&self.read_limiter).await;
        self.reader.fetch_by_id(id).await
    }

    /// Publish a standalone post, with limiter pacing and bounded retry.
    pub async fn post(&self, text: &str) -> Result<String, PlatformError> {
        self.write_with_retry(text, None).await
    }

    /// Publish a reply, with limiter pacing and bounded retry.
    pub async fn reply(&self, text: &str, parent_native_id: &str) -> Result<String, PlatformError> {
        self.write_with_retry(text, Some(parent_native_id)).await
    }

    async fn write_with_retry(
        &self,
        text: &str,
        parent: Option<&str>,
    ) -> Result<String, PlatformError> {
        let mut attempt = 0u32;
        loop {
            Self::acquire(&self.write_limiter).await;

            let result = match parent {
                None => self.writer.post(text).await,
                Some(parent_id) => self.writer.reply(text, parent_id).await,
            };

            match result {
                Ok(id) => return Ok(id),
                Err(e) if e.is_transient() && attempt + 1 < self.max_retries => {
                    let delay = self.base_delay * 2u32.pow(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "write failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "write failed, giving up");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockPlatform;
    use tokio::time::advance;

    fn limits(write_requests: u32, window_secs: u64) -> LimitsConfig {
        LimitsConfig {
            read_requests: 900,
            read_window_secs: 900,
            write_requests,
            write_window_secs: window_secs,
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }

    fn gateway(platform: &MockPlatform, limits: &LimitsConfig) -> Gateway {
        Gateway::new(
            Arc::new(platform.clone()),
            Arc::new(platform.clone()),
            limits,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn window_denies_fourth_request() {
        let mut window = SlidingWindow::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(window.can_proceed());
            window.record_request();
        }
        assert!(!window.can_proceed());

        // Past the window the oldest slots free up again
        advance(Duration::from_secs(61)).await;
        assert!(window.can_proceed());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_time_is_zero_when_open() {
        let mut window = SlidingWindow::new(2, Duration::from_secs(60));
        assert_eq!(window.wait_time(), Duration::ZERO);

        window.record_request();
        assert_eq!(window.wait_time(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_time_tracks_oldest_timestamp() {
        let mut window = SlidingWindow::new(1, Duration::from_secs(60));
        window.record_request();

        advance(Duration::from_secs(20)).await;
        assert_eq!(window.wait_time(), Duration::from_secs(40));

        advance(Duration::from_secs(40)).await;
        assert_eq!(window.wait_time(), Duration::ZERO);
        assert!(window.can_proceed());
    }

    #[tokio::test(start_paused = true)]
    async fn writes_pace_to_the_window() {
        let platform = MockPlatform::new("gw");
        let gateway = gateway(&platform, &limits(1, 60));

        let start = Instant::now();
        gateway.post("first").await.unwrap();
        gateway.post("second").await.unwrap();

        // The second write had to wait out the window
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(platform.written_posts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_from_transient_failures() {
        let platform = MockPlatform::new("gw");
        platform.fail_writes(2, "connection reset");
        let gateway = gateway(&platform, &limits(50, 900));

        let start = Instant::now();
        let id = gateway.post("eventually").await.unwrap();
        assert!(!id.is_empty());

        // Backoff slept 1s then 2s before the third attempt succeeded
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert_eq!(platform.written_posts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_exhaustion_surfaces_the_error() {
        let platform = MockPlatform::new("gw");
        platform.fail_writes(3, "still down");
        let gateway = gateway(&platform, &limits(50, 900));

        let err = gateway.post("never lands").await.unwrap_err();
        assert!(err.is_transient());
        assert!(platform.written_posts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_writes_are_not_retried() {
        struct RejectingWriter;

        #[async_trait::async_trait]
        impl crate::platform::PlatformWriter for RejectingWriter {
            async fn post(&self, _text: &str) -> Result<String, PlatformError> {
                Err(PlatformError::Rejected("post too long".to_string()))
            }
            async fn reply(&self, _t: &str, _p: &str) -> Result<String, PlatformError> {
                Err(PlatformError::Rejected("post too long".to_string()))
            }
        }

        let platform = MockPlatform::new("gw");
        let gateway = Gateway::new(
            Arc::new(platform),
            Arc::new(RejectingWriter),
            &limits(50, 900),
        );

        let start = Instant::now();
        let err = gateway.post("too long").await.unwrap_err();
        assert!(!err.is_transient());
        // No backoff sleeps happened
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn reads_flow_through_the_read_limiter() {
        let platform = MockPlatform::new("alice");
        platform.add_post(bridge_types::Post {
            native_id: "1".to_string(),
            text: "hi".to_string(),
            author: "alice".to_string(),
            reply_parent_id: None,
            created_at: 1,
        });

        let mut cfg = limits(50, 900);
        cfg.read_requests = 2;
        cfg.read_window_secs = 60;
        let gateway = gateway(&platform, &cfg);

        let start = Instant::now();
        gateway.fetch_recent("alice", 10).await.unwrap();
        gateway.fetch_by_id("1").await.unwrap();
        // Third read in the window has to wait
        gateway.fetch_recent("alice", 10).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
