//! Bidirectional sync orchestrator.
//!
//! One [`Orchestrator::sync`] invocation drives a single direction to
//! completion: fetch a page of candidates from the source, drop anything
//! the ledger already knows, reconstruct and mirror reply threads, write
//! singles, and record every successful write. The two directions may run
//! concurrently with each other, but each direction is single-flight.

use crate::config::BridgeConfig;
use crate::error::{EngineError, EngineResult};
use crate::gateway::Gateway;
use crate::thread::{is_thread, reconstruct_thread, thread_id};
use bridge_ledger::{NewSyncedPost, SyncLedger, ThreadEntry};
use bridge_types::fingerprint::fingerprint;
use bridge_types::{Direction, Platform, Post, SyncReport};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Top-level driver for both sync directions.
///
/// Owns nothing platform-specific: the ledger and the two gateways are
/// injected, so tests swap in an in-memory ledger and mock platforms.
pub struct Orchestrator {
    ledger: Arc<dyn SyncLedger>,
    mastodon: Arc<Gateway>,
    bluesky: Arc<Gateway>,
    config: BridgeConfig,
    // Single-flight guards, one per direction
    mastodon_to_bluesky: Mutex<()>,
    bluesky_to_mastodon: Mutex<()>,
}

impl Orchestrator {
    /// Create an orchestrator over the shared ledger and the two gateways.
    pub fn new(
        ledger: Arc<dyn SyncLedger>,
        mastodon: Arc<Gateway>,
        bluesky: Arc<Gateway>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            ledger,
            mastodon,
            bluesky,
            config,
            mastodon_to_bluesky: Mutex::new(()),
            bluesky_to_mastodon: Mutex::new(()),
        }
    }

    fn gateway(&self, platform: Platform) -> &Gateway {
        match platform {
            Platform::Mastodon => &self.mastodon,
            Platform::Bluesky => &self.bluesky,
        }
    }

    fn platform_config(&self, platform: Platform) -> &crate::config::PlatformConfig {
        match platform {
            Platform::Mastodon => &self.config.mastodon,
            Platform::Bluesky => &self.config.bluesky,
        }
    }

    fn flight_guard(&self, direction: Direction) -> &Mutex<()> {
        match direction {
            Direction::MastodonToBluesky => &self.mastodon_to_bluesky,
            Direction::BlueskyToMastodon => &self.bluesky_to_mastodon,
        }
    }

    /// Run one sync pass for `direction`.
    ///
    /// Candidates are processed strictly in source-fetch order; a failure
    /// on one candidate is reported and the loop continues. A second
    /// invocation of the same direction while one is in flight is refused
    /// with [`EngineError::DirectionBusy`].
    pub async fn sync(&self, direction: Direction) -> EngineResult<SyncReport> {
        let _guard = self
            .flight_guard(direction)
            .try_lock()
            .map_err(|_| EngineError::DirectionBusy { direction })?;

        for platform in [direction.source(), direction.target()] {
            if !self.platform_config(platform).credentials_available {
                return Err(EngineError::MissingCredentials { platform });
            }
        }

        let source = direction.source();
        let target = direction.target();
        let source_gateway = self.gateway(source);
        let target_gateway = self.gateway(target);
        let author = self.platform_config(source).account.clone();

        tracing::info!(%direction, "sync pass started");

        let candidates = source_gateway
            .fetch_recent(&author, self.config.sync.page_size)
            .await?;

        let mut report = SyncReport::default();

        for candidate in candidates {
            if !self
                .ledger
                .should_sync(&candidate.text, source, &candidate.native_id)
                .await?
            {
                tracing::debug!(id = %candidate.native_id, "already synced, skipping");
                report.skipped += 1;
                continue;
            }

            if is_thread(&candidate) {
                let chain =
                    reconstruct_thread(source_gateway, &candidate.native_id, &candidate.author)
                        .await;
                if !chain.is_empty() {
                    let tid = thread_id(source, &chain[0].native_id);
                    if self.ledger.is_thread_recorded(&tid).await? {
                        tracing::debug!(thread_id = %tid, "thread already synced, skipping");
                        report.skipped += 1;
                        continue;
                    }
                    match self.sync_thread(&chain, target_gateway, source, target, &tid).await {
                        Ok(count) => report.synced += count,
                        Err(e) => {
                            tracing::warn!(id = %candidate.native_id, error = %e, "thread sync failed");
                            report.errors.push(format!("{}: {}", candidate.native_id, e));
                        }
                    }
                    continue;
                }
                // Reconstruction failed or found nothing: fall back to the
                // single originally observed post
            }

            match self.sync_single(&candidate, target_gateway, source, target).await {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    tracing::warn!(id = %candidate.native_id, error = %e, "sync failed");
                    report.errors.push(format!("{}: {}", candidate.native_id, e));
                }
            }
        }

        tracing::info!(%direction, %report, "sync pass finished");
        Ok(report)
    }

    /// Mirror a thread to the target, root to leaf, then record it.
    ///
    /// Members whose content the ledger already knows are never re-written:
    /// a root that crossed over as a single post before it had replies must
    /// not land on the target twice. Such members instead seed the reply
    /// parent from their recorded mirror, so the new tail chains onto the
    /// post that carried the root across earlier.
    ///
    /// Each remaining write supplies the previously written target id as
    /// its reply parent. The ledger commit happens only after every write
    /// succeeds; a mid-thread failure leaves the new members unrecorded and
    /// a later pass retries them.
    async fn sync_thread(
        &self,
        chain: &[Post],
        target_gateway: &Gateway,
        source: Platform,
        target: Platform,
        tid: &str,
    ) -> EngineResult<u32> {
        let mut entries = Vec::new();
        let mut parent: Option<String> = None;

        for post in chain {
            if !self
                .ledger
                .should_sync(&post.text, source, &post.native_id)
                .await?
            {
                if let Some(row) = self
                    .ledger
                    .lookup_by_fingerprint(&fingerprint(&post.text))
                    .await?
                {
                    if row.target_native_id.is_some() {
                        parent = row.target_native_id;
                    }
                }
                continue;
            }

            let written_id = match &parent {
                None => target_gateway.post(&post.text).await?,
                Some(parent_id) => target_gateway.reply(&post.text, parent_id).await?,
            };
            entries.push(ThreadEntry {
                source_native_id: Some(post.native_id.clone()),
                target_native_id: Some(written_id.clone()),
                original_text: post.text.clone(),
            });
            parent = Some(written_id);
        }

        if entries.is_empty() {
            tracing::debug!(thread_id = %tid, "every thread member already mirrored");
            return Ok(0);
        }

        let synced = entries.len() as u32;
        if let Err(e) = self.ledger.record_thread(entries, source, target, tid).await {
            // A duplicate is only an idempotent outcome if some other pass
            // actually got the thread recorded
            if e.is_duplicate() && self.ledger.is_thread_recorded(tid).await? {
                tracing::debug!(thread_id = %tid, "thread raced an earlier record, treating as synced");
            } else {
                return Err(e.into());
            }
        }

        tracing::info!(thread_id = %tid, posts = synced, "thread synced");
        Ok(synced)
    }

    /// Mirror one standalone post to the target and record it.
    async fn sync_single(
        &self,
        candidate: &Post,
        target_gateway: &Gateway,
        source: Platform,
        target: Platform,
    ) -> EngineResult<()> {
        let written_id = target_gateway.post(&candidate.text).await?;

        match self
            .ledger
            .record(NewSyncedPost {
                source_platform: source,
                target_platform: target,
                source_native_id: Some(candidate.native_id.clone()),
                target_native_id: Some(written_id),
                original_text: candidate.text.clone(),
            })
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_duplicate() => {
                tracing::debug!(id = %candidate.native_id, "record raced a concurrent writer, treating as synced");
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(id = %candidate.native_id, "post synced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LimitsConfig, PlatformConfig, SyncConfig};
    use crate::platform::MockPlatform;
    use bridge_ledger::SqliteLedger;
    use std::time::Duration;

    struct Fixture {
        mastodon: MockPlatform,
        bluesky: MockPlatform,
        orchestrator: Orchestrator,
    }

    async fn fixture() -> Fixture {
        fixture_with_page_size(10).await
    }

    async fn fixture_with_page_size(page_size: u32) -> Fixture {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();

        let mastodon = MockPlatform::new("alice");
        let bluesky = MockPlatform::new("alice");
        let limits = LimitsConfig {
            read_requests: 10_000,
            read_window_secs: 900,
            write_requests: 10_000,
            write_window_secs: 900,
            max_retries: 3,
            base_delay_ms: 1,
        };
        let config = BridgeConfig {
            sync: SyncConfig { page_size },
            limits: limits.clone(),
            mastodon: PlatformConfig {
                account: "alice".to_string(),
                credentials_available: true,
            },
            bluesky: PlatformConfig {
                account: "alice".to_string(),
                credentials_available: true,
            },
        };

        let ledger = Arc::new(SqliteLedger::in_memory().await.unwrap());
        let mastodon_gateway = Arc::new(Gateway::new(
            Arc::new(mastodon.clone()),
            Arc::new(mastodon.clone()),
            &limits,
        ));
        let bluesky_gateway = Arc::new(Gateway::new(
            Arc::new(bluesky.clone()),
            Arc::new(bluesky.clone()),
            &limits,
        ));

        let orchestrator = Orchestrator::new(ledger, mastodon_gateway, bluesky_gateway, config);
        Fixture {
            mastodon,
            bluesky,
            orchestrator,
        }
    }

    fn post(id: u64, text: &str, parent: Option<u64>) -> Post {
        Post {
            native_id: id.to_string(),
            text: text.to_string(),
            author: "alice".to_string(),
            reply_parent_id: parent.map(|p| p.to_string()),
            created_at: id as i64,
        }
    }

    #[tokio::test]
    async fn syncs_new_posts() {
        let f = fixture().await;
        f.mastodon.add_post(post(100, "first post", None));
        f.mastodon.add_post(post(101, "second post", None));

        let report = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();
        assert_eq!(report.synced, 2);
        assert_eq!(report.skipped, 0);
        assert!(report.is_clean());
        assert_eq!(f.bluesky.written_posts().len(), 2);
    }

    #[tokio::test]
    async fn second_pass_skips_everything() {
        let f = fixture().await;
        f.mastodon.add_post(post(100, "only once", None));

        f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();
        let report = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();

        assert_eq!(report.synced, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(f.bluesky.written_posts().len(), 1);
    }

    #[tokio::test]
    async fn mirrored_content_never_bounces_back() {
        let f = fixture().await;
        f.mastodon.add_post(post(100, "Crossing the bridge", None));
        f.mastodon.add_post(post(101, "Another thought", None));

        let forward = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();
        assert_eq!(forward.synced, 2);

        // The reverse pass observes the mirrored posts on Bluesky
        let reverse = f.orchestrator.sync(Direction::BlueskyToMastodon).await.unwrap();
        assert_eq!(reverse.synced, 0);
        assert_eq!(reverse.skipped, 2);
        assert!(f.mastodon.written_posts().is_empty());
    }

    #[tokio::test]
    async fn thread_is_mirrored_with_reply_chaining() {
        let f = fixture().await;
        f.mastodon.add_post(post(100, "thread root", None));
        f.mastodon.add_post(post(101, "thread middle", Some(100)));
        f.mastodon.add_post(post(102, "thread end", Some(101)));

        let report = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();
        assert_eq!(report.synced, 3);
        assert_eq!(report.skipped, 2);

        // Root to leaf, each reply hanging off the previous write
        let written = f.bluesky.written_posts();
        assert_eq!(written.len(), 3);
        assert_eq!(written[0].text, "thread root");
        assert_eq!(written[0].parent, None);
        assert_eq!(written[1].parent, Some(written[0].id.clone()));
        assert_eq!(written[2].parent, Some(written[1].id.clone()));

        let rows = f.orchestrator.ledger.get_thread("mastodon_100").await.unwrap();
        let positions: Vec<u32> = rows.iter().map(|r| r.thread_position.unwrap()).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn root_synced_single_then_reply_extends_the_thread() {
        let f = fixture().await;
        f.mastodon.add_post(post(100, "thread root", None));

        // The root crosses over alone, before any reply exists
        let report = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();
        assert_eq!(report.synced, 1);

        // The author replies to their own post; the next pass reconstructs
        // [root, reply] but must not re-post the root
        f.mastodon.add_post(post(101, "thread reply", Some(100)));
        let report = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();
        assert_eq!(report.synced, 1);
        assert!(report.is_clean());

        let written = f.bluesky.written_posts();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].text, "thread root");
        // The reply chains onto the root's existing mirror
        assert_eq!(written[1].text, "thread reply");
        assert_eq!(written[1].parent, Some(written[0].id.clone()));

        let rows = f.orchestrator.ledger.get_thread("mastodon_100").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].original_text, "thread reply");
        assert_eq!(f.orchestrator.ledger.synced_count().await.unwrap(), 2);

        // Further passes change nothing: both fingerprints are recorded
        let report = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();
        assert_eq!(report.synced, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(f.bluesky.written_posts().len(), 2);
        assert_eq!(f.orchestrator.ledger.synced_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn synced_thread_is_not_resynced() {
        let f = fixture().await;
        f.mastodon.add_post(post(100, "thread root", None));
        f.mastodon.add_post(post(101, "thread reply", Some(100)));

        f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();
        let report = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();

        assert_eq!(report.synced, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(f.bluesky.written_posts().len(), 2);
    }

    #[tokio::test]
    async fn reconstruction_failure_falls_back_to_single() {
        let f = fixture().await;
        f.mastodon.add_post(post(100, "parent post", None));
        f.mastodon.add_post(post(101, "orphaned reply", Some(100)));
        // First fetch_by_id during reconstruction fails
        f.mastodon.fail_next_fetch_by_id("upstream down");

        let report = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();

        // The reply went over as a standalone post, then the parent synced
        assert_eq!(report.synced, 2);
        let written = f.bluesky.written_posts();
        assert_eq!(written[0].text, "orphaned reply");
        assert_eq!(written[0].parent, None);
    }

    // Real time: the in-memory ledger hands out pool connections from a
    // blocking thread, which a paused clock times out before it can run.
    #[tokio::test]
    async fn one_failing_candidate_does_not_abort_the_batch() {
        let f = fixture().await;
        f.mastodon.add_post(post(100, "will land", None));
        f.mastodon.add_post(post(101, "will fail", None));
        // Newest first: 101 exhausts all three attempts, then 100 lands
        f.bluesky.fail_writes(3, "write refused");

        let report = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();
        assert_eq!(report.synced, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("101:"));
        assert_eq!(f.bluesky.written_posts().len(), 1);
        assert_eq!(f.bluesky.written_posts()[0].text, "will land");
    }

    #[tokio::test]
    async fn missing_credentials_refuses_the_direction() {
        let mut f = fixture().await;
        f.orchestrator.config.bluesky.credentials_available = false;
        f.mastodon.add_post(post(100, "stuck", None));

        let err = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingCredentials {
                platform: Platform::Bluesky
            }
        ));
        assert!(f.bluesky.written_posts().is_empty());
    }

    #[tokio::test]
    async fn same_direction_is_single_flight() {
        let f = fixture().await;
        f.mastodon.add_post(post(100, "slow fetch", None));
        f.mastodon.set_fetch_delay(Duration::from_millis(50));

        let orchestrator = Arc::new(f.orchestrator);
        let first = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.sync(Direction::MastodonToBluesky).await })
        };
        // Let the first invocation reach its fetch and suspend
        tokio::task::yield_now().await;

        let second = orchestrator.sync(Direction::MastodonToBluesky).await;
        assert!(matches!(
            second,
            Err(EngineError::DirectionBusy {
                direction: Direction::MastodonToBluesky
            })
        ));

        let report = first.await.unwrap().unwrap();
        assert_eq!(report.synced, 1);
    }

    #[tokio::test]
    async fn opposite_directions_run_concurrently() {
        let f = fixture().await;
        f.mastodon.add_post(post(100, "from mastodon", None));
        f.bluesky.add_post(post(500, "from bluesky", None));
        f.mastodon.set_fetch_delay(Duration::from_millis(50));
        f.bluesky.set_fetch_delay(Duration::from_millis(50));

        let orchestrator = Arc::new(f.orchestrator);
        let (forward, reverse) = tokio::join!(
            orchestrator.sync(Direction::MastodonToBluesky),
            orchestrator.sync(Direction::BlueskyToMastodon),
        );

        assert_eq!(forward.unwrap().synced, 1);
        assert_eq!(reverse.unwrap().synced, 1);
    }

    #[tokio::test]
    async fn stress_alternating_directions_leave_exactly_one_row_each() {
        let f = fixture_with_page_size(200).await;

        for i in 0..50 {
            f.mastodon.add_post(post(1000 + i, &format!("mastodon original {i}"), None));
            f.bluesky.add_post(post(5000 + i, &format!("bluesky original {i}"), None));
        }

        let forward = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();
        let reverse = f.orchestrator.sync(Direction::BlueskyToMastodon).await.unwrap();
        assert_eq!(forward.synced, 50);
        // The reverse pass sees its own 50 originals plus 50 mirrors
        assert_eq!(reverse.synced, 50);
        assert_eq!(reverse.skipped, 50);

        assert_eq!(f.orchestrator.ledger.synced_count().await.unwrap(), 100);

        // Running both directions again changes nothing
        let forward = f.orchestrator.sync(Direction::MastodonToBluesky).await.unwrap();
        let reverse = f.orchestrator.sync(Direction::BlueskyToMastodon).await.unwrap();
        assert_eq!(forward.synced, 0);
        assert_eq!(reverse.synced, 0);
        assert_eq!(f.orchestrator.ledger.synced_count().await.unwrap(), 100);
    }
}
