//! Error types for bridge-engine.

use bridge_ledger::LedgerError;
use bridge_types::{Direction, Platform};

use crate::config::ConfigError;
use crate::platform::PlatformError;

/// Main error type for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Credentials are not available for a platform this direction needs.
    ///
    /// Fatal for the current invocation of this direction only; the other
    /// direction is unaffected.
    #[error("credentials not available for {platform}")]
    MissingCredentials {
        /// The platform missing credentials.
        platform: Platform,
    },

    /// A sync pass for this direction is already in flight.
    #[error("sync already in progress for {direction}")]
    DirectionBusy {
        /// The refused direction.
        direction: Direction,
    },

    /// Platform read/write error.
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
