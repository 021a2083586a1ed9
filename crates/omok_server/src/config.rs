//! Session configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Timing knobs for a game session.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// turn_allowance = 30
/// tick_millis = 1000
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
#[serde(default)]
pub struct SessionConfig {
    /// Ticks a player gets per turn.
    turn_allowance: u32,

    /// Length of one clock tick in milliseconds.
    tick_millis: u64,

    /// How long an out-of-order gap may stay open before a full resync.
    gap_timeout_millis: u64,

    /// Delay before retrying a failed resync.
    resync_backoff_millis: u64,

    /// Poll period of the SQLite change feed.
    poll_millis: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            turn_allowance: 60,
            tick_millis: 1_000,
            gap_timeout_millis: 2_000,
            resync_backoff_millis: 500,
            poll_millis: 250,
        }
    }
}

impl SessionConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading session config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        info!(?config, "Session config loaded");
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            info!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Rejects values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.turn_allowance == 0 {
            return Err(ConfigError::new("turn_allowance must be at least 1"));
        }
        for (name, millis) in [
            ("tick_millis", self.tick_millis),
            ("gap_timeout_millis", self.gap_timeout_millis),
            ("resync_backoff_millis", self.resync_backoff_millis),
            ("poll_millis", self.poll_millis),
        ] {
            if millis == 0 {
                return Err(ConfigError::new(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    /// One clock tick.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    /// Bounded wait for a missing move order.
    pub fn gap_timeout(&self) -> Duration {
        Duration::from_millis(self.gap_timeout_millis)
    }

    /// Delay between resync attempts.
    pub fn resync_backoff(&self) -> Duration {
        Duration::from_millis(self.resync_backoff_millis)
    }

    /// SQLite feed poll period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_millis)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
