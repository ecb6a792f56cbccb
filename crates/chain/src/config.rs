//! Ledger configuration.
//!
//! Built programmatically or loaded from a JSON file; every field has a
//! default, so a partial file is fine.

use coinchain_consensus::{MinerConfig, MAX_DIFFICULTY};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::mempool::MempoolConfig;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How sealing reacts to a transaction that can no longer be confirmed
/// (wallet or coin missing, coin not owned by the sender).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityPolicy {
    /// Check every transaction before touching state; any fault aborts the
    /// seal and nothing is appended.
    #[default]
    Strict,
    /// Confirm what can be confirmed, report the rest, append anyway.
    Lenient,
}

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Leading zero hex digits required of a mined block hash.
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,

    /// Parallel mining lanes. `None` uses the rayon pool size.
    #[serde(default)]
    pub mining_workers: Option<usize>,

    /// Abandon a seal attempt after this many milliseconds.
    #[serde(default)]
    pub mining_timeout_ms: Option<u64>,

    /// Maximum transactions waiting in the pending pool.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Reaction to confirmation faults.
    #[serde(default)]
    pub integrity: IntegrityPolicy,
}

fn default_difficulty() -> u32 {
    4
}

fn default_max_pending() -> usize {
    10_000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_workers: None,
            mining_timeout_ms: None,
            max_pending: default_max_pending(),
            integrity: IntegrityPolicy::default(),
        }
    }
}

impl LedgerConfig {
    /// Default configuration at the given difficulty.
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "difficulty {} exceeds the maximum of {}",
                self.difficulty, MAX_DIFFICULTY
            )));
        }
        if self.max_pending == 0 {
            return Err(ConfigError::Invalid("max_pending must be positive".into()));
        }
        if self.mining_workers == Some(0) {
            return Err(ConfigError::Invalid("mining_workers must be positive".into()));
        }
        Ok(())
    }

    pub fn mining_timeout(&self) -> Option<Duration> {
        self.mining_timeout_ms.map(Duration::from_millis)
    }

    /// Miner settings derived from this configuration.
    pub fn miner_config(&self) -> MinerConfig {
        let defaults = MinerConfig::default();
        MinerConfig {
            difficulty: self.difficulty,
            workers: self.mining_workers.unwrap_or(defaults.workers),
            timeout: self.mining_timeout(),
        }
    }

    pub fn mempool_config(&self) -> MempoolConfig {
        MempoolConfig {
            max_transactions: self.max_pending,
        }
    }
}
