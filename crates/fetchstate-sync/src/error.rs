//! # Engine Error Types
//!
//! Errors raised by the engine itself, as opposed to [`FetchError`]s that a
//! producer rejects with. Producer failures never surface here: they are
//! routed into the observable state.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Engine Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────────────┐        ┌─────────────────────────────┐    │
//! │  │     Configuration       │        │        Lifecycle            │    │
//! │  │                         │        │                             │    │
//! │  │  InvalidConfig          │        │  NoRuntime                  │    │
//! │  │  ConfigLoadFailed       │        │  TornDown                   │    │
//! │  │  ConfigSaveFailed       │        │                             │    │
//! │  └─────────────────────────┘        └─────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`FetchError`]: fetchstate_core::FetchError

use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid synchronizer configuration.
    #[error("Invalid fetch configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// Built outside of a Tokio runtime.
    #[error("No Tokio runtime available to drive the synchronizer")]
    NoRuntime,

    /// The synchronizer was already torn down.
    #[error("Synchronizer has been torn down")]
    TornDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidConfig(_)
                | EngineError::ConfigLoadFailed(_)
                | EngineError::ConfigSaveFailed(_)
        )
    }
}
