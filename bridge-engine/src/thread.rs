//! Reply-thread reconstruction.
//!
//! Given one observed post, decide whether it belongs to a reply chain and
//! rebuild the full chain from the source platform: walk parent references
//! backward while they stay with the same author, then sweep the author's
//! recent posts forward for replies to anything already collected.
//!
//! Both walks are bounded by [`MAX_THREAD_LENGTH`] and a visited-id set, so
//! malformed or cyclic parent data cannot loop regardless of what the
//! platform returns.

use crate::gateway::Gateway;
use crate::platform::PlatformError;
use bridge_types::{Platform, Post};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Maximum posts assembled into one thread.
///
/// Chains longer than this are cut at the cap after ordering, keeping the
/// oldest members. The dropped tail can include the post that triggered
/// reconstruction; once the capped thread is recorded, that tail stays
/// unmirrored (later passes skip the already-recorded head and find nothing
/// new to write).
pub const MAX_THREAD_LENGTH: usize = 10;

/// How many recent posts the forward sweep inspects.
const FORWARD_SEARCH_LIMIT: u32 = 50;

/// Whether the post carries a reply-to-parent reference.
pub fn is_thread(post: &Post) -> bool {
    post.is_reply()
}

/// Ledger key for a thread: `"{source_platform}_{root_native_id}"`.
pub fn thread_id(source_platform: Platform, root_native_id: &str) -> String {
    format!("{}_{}", source_platform, root_native_id)
}

/// Reconstruct the ordered reply chain containing `post_id`, root first.
///
/// Returns an empty list if the post cannot be found or any fetch fails;
/// the caller falls back to syncing the single originally observed post.
pub async fn reconstruct_thread(gateway: &Gateway, post_id: &str, author: &str) -> Vec<Post> {
    match try_reconstruct(gateway, post_id, author).await {
        Ok(chain) => chain,
        Err(e) => {
            tracing::warn!(post_id, error = %e, "thread reconstruction failed");
            Vec::new()
        }
    }
}

async fn try_reconstruct(
    gateway: &Gateway,
    post_id: &str,
    author: &str,
) -> Result<Vec<Post>, PlatformError> {
    let Some(origin) = gateway.fetch_by_id(post_id).await? else {
        return Ok(Vec::new());
    };

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(origin.native_id.clone());
    let mut chain = vec![origin];

    // Backward walk: follow parent references while they stay on-author
    for _ in 0..MAX_THREAD_LENGTH {
        let Some(parent_id) = chain[0].reply_parent_id.clone() else {
            break;
        };
        if !visited.insert(parent_id.clone()) {
            // Cyclic parent data; stop regardless of author
            break;
        }
        let Some(parent) = gateway.fetch_by_id(&parent_id).await? else {
            break;
        };
        if parent.author != author {
            break;
        }
        chain.insert(0, parent);
    }

    // Forward walk: pick up replies to anything collected so far
    if chain.len() < MAX_THREAD_LENGTH {
        let recent = gateway.fetch_recent(author, FORWARD_SEARCH_LIMIT).await?;
        loop {
            let mut grew = false;
            for post in &recent {
                if chain.len() >= MAX_THREAD_LENGTH {
                    break;
                }
                if visited.contains(&post.native_id) {
                    continue;
                }
                let continues_chain = post
                    .reply_parent_id
                    .as_deref()
                    .is_some_and(|parent| visited.contains(parent));
                if continues_chain {
                    visited.insert(post.native_id.clone());
                    chain.push(post.clone());
                    grew = true;
                }
            }
            if !grew || chain.len() >= MAX_THREAD_LENGTH {
                break;
            }
        }
    }

    // Native ids are monotonically increasing on both platforms, so id
    // order is chronological order
    chain.sort_by(|a, b| native_id_order(&a.native_id, &b.native_id));
    chain.truncate(MAX_THREAD_LENGTH);
    Ok(chain)
}

/// Numeric-string order: shorter ids are older, equal lengths compare
/// lexically. Equals numeric order for the decimal ids both platforms issue.
fn native_id_order(a: &str, b: &str) -> Ordering {
    (a.len(), a).cmp(&(b.len(), b))
}
