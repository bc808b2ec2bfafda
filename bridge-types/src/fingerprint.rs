//! Content normalization and fingerprinting.
//!
//! The fingerprint is the primary dedup key: two posts that differ only by
//! case, whitespace, or embedded URLs (a link-shortener rewrite, a tracking
//! parameter) normalize identically and hash to the same fingerprint.
//!
//! Known product decision: two independently authored posts with identical
//! normalized text ("Good morning") collide and the second is treated as a
//! duplicate. The fingerprint is the loop-prevention mechanism, so this is
//! accepted rather than weakened.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Matches URL-shaped substrings for removal during normalization.
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid URL regex"));

/// Normalize post text for fingerprinting.
///
/// Lowercases, strips `http(s)://` URLs, collapses internal whitespace runs
/// to single spaces, and trims.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = URL_RE.replace_all(&lowered, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 fingerprint of the normalized text, as 64 lower-hex chars.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(text).as_bytes());
    hex::encode(hasher.finalize())
}
