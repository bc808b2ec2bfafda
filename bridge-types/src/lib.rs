//! # bridge-types
//!
//! Core value types and content fingerprinting for postbridge.
//!
//! This crate provides the foundational types used across all postbridge
//! crates:
//! - [`Platform`], [`Direction`] - Which platform a post lives on and which
//!   way a sync pass flows
//! - [`Post`] - The canonical post shape the core manipulates (one adapter
//!   per platform reader maps native objects into this)
//! - [`SyncedPost`] - One ledger row per propagated post
//! - [`SyncReport`] - Structured outcome of one sync pass
//! - [`fingerprint`] - Content normalization and hashing (the dedup key)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fingerprint;
mod post;

pub use post::{Direction, Platform, PlatformParseError, Post, SyncReport, SyncedPost};
