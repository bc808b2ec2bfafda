//! # bridge-engine
//!
//! Bidirectional sync orchestration for postbridge.
//!
//! This crate drives one sync direction at a time: it fetches candidate
//! posts from the source platform through a rate-limited [`Gateway`],
//! consults the shared [`SyncLedger`](bridge_ledger::SyncLedger) to drop
//! anything already propagated, reconstructs reply threads where needed,
//! writes to the target platform, and records outcomes.
//!
//! ## Architecture
//!
//! ```text
//!  Mastodon ◄──Gateway──┐              ┌──Gateway──► Bluesky
//!                       │              │
//!                  ┌────┴──────────────┴────┐
//!                  │      Orchestrator      │
//!                  │  ┌────────────────┐    │
//!                  │  │ SQLite ledger  │    │
//!                  │  │ (fingerprints) │    │
//!                  │  └────────────────┘    │
//!                  └────────────────────────┘
//! ```
//!
//! The core exposes a single operation, [`Orchestrator::sync`], invoked by
//! an external scheduler on a fixed interval per direction. It has no CLI
//! or network listener of its own.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod platform;
pub mod thread;

pub use config::BridgeConfig;
pub use error::{EngineError, EngineResult};
pub use gateway::Gateway;
pub use orchestrator::Orchestrator;
