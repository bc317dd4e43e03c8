//! Engine configuration.
//!
//! # Responsibility
//! - Hold the store key, autosave debounce delay and store capacity.
//! - Reject values that would make persistence silently misbehave.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Key the report envelope lives under.
///
/// Kept identical to the key used by the browser build so existing stores
/// are picked up and migrated.
pub const DEFAULT_STORAGE_KEY: &str = "lab_report_autosave_v1";
/// Quiet period after the last edit before an autosave fires.
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(1000);
/// Typical per-origin local storage quota.
pub const DEFAULT_STORE_CAPACITY_BYTES: usize = 5 * 1024 * 1024;

/// Persistence engine and scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub storage_key: String,
    pub autosave_delay: Duration,
    pub store_capacity_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            autosave_delay: DEFAULT_AUTOSAVE_DELAY,
            store_capacity_bytes: DEFAULT_STORE_CAPACITY_BYTES,
        }
    }
}

impl EngineConfig {
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_autosave_delay(mut self, delay: Duration) -> Self {
        self.autosave_delay = delay;
        self
    }

    pub fn with_store_capacity_bytes(mut self, capacity: usize) -> Self {
        self.store_capacity_bytes = capacity;
        self
    }

    /// Validates configuration invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::EmptyStorageKey);
        }
        if self.autosave_delay.is_zero() {
            return Err(ConfigError::ZeroAutosaveDelay);
        }
        if self.store_capacity_bytes == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    EmptyStorageKey,
    ZeroAutosaveDelay,
    ZeroCapacity,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyStorageKey => write!(f, "storage key must not be empty"),
            Self::ZeroAutosaveDelay => write!(f, "autosave delay must be greater than zero"),
            Self::ZeroCapacity => write!(f, "store capacity must be greater than zero"),
        }
    }
}

impl Error for ConfigError {}
