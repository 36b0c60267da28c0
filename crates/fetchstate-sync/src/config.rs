//! # Synchronizer Configuration
//!
//! Configuration for one synchronizer instance. Read once when the
//! synchronizer is built; later changes to a loaded config have no effect
//! on running instances.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FETCHSTATE_REFRESH_INTERVAL_MS=30000                               │
//! │     FETCHSTATE_RESET_ON_PRODUCER_CHANGE=true                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/fetchstate/fetchstate.toml (Linux)                       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     no polling, keep state on producer change, lenient contract        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! label = "pipeline-run-jobs"
//!
//! [polling]
//! refresh_interval_ms = 30000  # 0 disables polling
//!
//! [state]
//! reset_on_producer_change = true
//! contract = "lenient"  # lenient | strict
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Constants
// =============================================================================

/// Smallest nonzero refresh interval accepted by [`FetchConfig::validate`].
pub const MIN_REFRESH_INTERVAL_MS: u64 = 10;

/// Config file name inside the platform config directory.
const CONFIG_FILE_NAME: &str = "fetchstate.toml";

// =============================================================================
// Contract Policy
// =============================================================================

/// What to do when a producer resolves without a value.
///
/// ```text
/// LENIENT (Default)                    STRICT
/// ─────────────────                    ──────
/// • Log an error diagnostic            • Log an error diagnostic
/// • State untouched                    • Set FetchState::error
/// • Refresh resolves to None           • Refresh resolves to None
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractPolicy {
    /// Log the violation and leave state untouched.
    #[default]
    Lenient,

    /// Surface the violation as a reportable error.
    Strict,
}

impl std::fmt::Display for ContractPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractPolicy::Lenient => write!(f, "lenient"),
            ContractPolicy::Strict => write!(f, "strict"),
        }
    }
}

impl std::str::FromStr for ContractPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lenient" | "log" => Ok(ContractPolicy::Lenient),
            "strict" | "error" => Ok(ContractPolicy::Strict),
            other => Err(EngineError::InvalidConfig(format!(
                "Unknown contract policy: '{}'. Valid options: lenient, strict",
                other
            ))),
        }
    }
}

// =============================================================================
// Polling Settings
// =============================================================================

/// Periodic re-invocation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Interval between invocations (milliseconds). 0 disables polling.
    #[serde(default)]
    pub refresh_interval_ms: u64,
}

// =============================================================================
// State Settings
// =============================================================================

/// Rules for the observable state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSettings {
    /// Drop value, loaded and error when the producer identity changes.
    #[serde(default)]
    pub reset_on_producer_change: bool,

    /// Handling of producers that resolve without a value.
    #[serde(default)]
    pub contract: ContractPolicy,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete synchronizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Name attached to every log line of this synchronizer.
    #[serde(default = "default_label")]
    pub label: String,

    /// Polling settings.
    #[serde(default)]
    pub polling: PollingSettings,

    /// State settings.
    #[serde(default)]
    pub state: StateSettings,
}

fn default_label() -> String {
    "fetch-state".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            label: default_label(),
            polling: PollingSettings::default(),
            state: StateSettings::default(),
        }
    }
}

impl FetchConfig {
    /// Creates a config that polls every `refresh_interval_ms`.
    pub fn polling(refresh_interval_ms: u64) -> Self {
        Self::default().with_refresh_interval_ms(refresh_interval_ms)
    }

    // =========================================================================
    // Builder Methods
    // =========================================================================

    /// Sets the log label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the polling interval (0 disables polling).
    pub fn with_refresh_interval_ms(mut self, refresh_interval_ms: u64) -> Self {
        self.polling.refresh_interval_ms = refresh_interval_ms;
        self
    }

    /// Sets whether a producer change resets the state.
    pub fn with_reset_on_producer_change(mut self, reset: bool) -> Self {
        self.state.reset_on_producer_change = reset;
        self
    }

    /// Sets the contract violation policy.
    pub fn with_contract(mut self, contract: ContractPolicy) -> Self {
        self.state.contract = contract;
        self
    }

    // =========================================================================
    // Loading & Saving
    // =========================================================================

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (fetchstate.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading fetch config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load fetch config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses and validates a TOML document. Environment is not consulted.
    pub fn from_toml_str(contents: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Fetch config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.label.trim().is_empty() {
            return Err(EngineError::InvalidConfig("label must not be empty".into()));
        }

        let interval = self.polling.refresh_interval_ms;
        if interval != 0 && interval < MIN_REFRESH_INTERVAL_MS {
            return Err(EngineError::InvalidConfig(format!(
                "refresh_interval_ms must be 0 or at least {}, got: {}",
                MIN_REFRESH_INTERVAL_MS, interval
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(label) = std::env::var("FETCHSTATE_LABEL") {
            self.label = label;
        }

        if let Ok(interval) = std::env::var("FETCHSTATE_REFRESH_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(ms) => {
                    debug!(refresh_interval_ms = ms, "Overriding refresh interval from environment");
                    self.polling.refresh_interval_ms = ms;
                }
                Err(_) => warn!(value = %interval, "Ignoring non-numeric refresh interval in environment"),
            }
        }

        if let Ok(reset) = std::env::var("FETCHSTATE_RESET_ON_PRODUCER_CHANGE") {
            match reset.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.state.reset_on_producer_change = true,
                "0" | "false" | "no" => self.state.reset_on_producer_change = false,
                _ => warn!(value = %reset, "Unknown reset flag in environment"),
            }
        }

        if let Ok(contract) = std::env::var("FETCHSTATE_CONTRACT") {
            match contract.parse() {
                Ok(parsed) => self.state.contract = parsed,
                Err(e) => warn!(%e, "Ignoring contract policy from environment"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "fetchstate", "fetchstate")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Polling period, or `None` when polling is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.polling.refresh_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Returns true if a producer change resets the state.
    pub fn reset_on_producer_change(&self) -> bool {
        self.state.reset_on_producer_change
    }

    /// Returns the contract violation policy.
    pub fn contract(&self) -> ContractPolicy {
        self.state.contract
    }
}
