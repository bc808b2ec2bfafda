//! Configuration loading for bridge-engine.
//!
//! Configuration is loaded from a TOML file (default: `bridge.toml`).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Sync pass configuration.
    pub sync: SyncConfig,
    /// Rate limiting and retry configuration.
    pub limits: LimitsConfig,
    /// Mastodon side configuration.
    pub mastodon: PlatformConfig,
    /// Bluesky side configuration.
    pub bluesky: PlatformConfig,
}

/// Sync pass configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Maximum candidates fetched per pass (default: 10).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Rate limiting and retry configuration.
///
/// Platform API terms bucket reads and writes separately, so each operation
/// class gets its own sliding window.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Read requests allowed per window (default: 900).
    #[serde(default = "default_read_requests")]
    pub read_requests: u32,
    /// Read window length in seconds (default: 900).
    #[serde(default = "default_window_secs")]
    pub read_window_secs: u64,
    /// Write requests allowed per window (default: 50).
    #[serde(default = "default_write_requests")]
    pub write_requests: u32,
    /// Write window length in seconds (default: 900).
    #[serde(default = "default_window_secs")]
    pub write_window_secs: u64,
    /// Write attempts before surfacing a failure (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff delay in milliseconds, doubled per attempt (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl LimitsConfig {
    /// Base backoff delay as a [`Duration`].
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Per-platform configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Account handle whose posts are bridged.
    #[serde(default)]
    pub account: String,
    /// Whether the external credential store has usable credentials.
    ///
    /// Set by the session-management collaborator; the core only reads it.
    #[serde(default)]
    pub credentials_available: bool,
}

// Default value functions
fn default_page_size() -> u32 {
    10
}

fn default_read_requests() -> u32 {
    900
}

fn default_write_requests() -> u32 {
    50
}

fn default_window_secs() -> u64 {
    900
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig {
                page_size: default_page_size(),
            },
            limits: LimitsConfig {
                read_requests: default_read_requests(),
                read_window_secs: default_window_secs(),
                write_requests: default_write_requests(),
                write_window_secs: default_window_secs(),
                max_retries: default_max_retries(),
                base_delay_ms: default_base_delay_ms(),
            },
            mastodon: PlatformConfig {
                account: String::new(),
                credentials_available: false,
            },
            bluesky: PlatformConfig {
                account: String::new(),
                credentials_available: false,
            },
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
