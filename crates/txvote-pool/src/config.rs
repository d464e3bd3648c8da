//! Pool configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::PoolError;

/// Default maximum payload size: a 1 MiB frame minus the 8-byte gossip envelope.
pub const DEFAULT_MAX_TX_BYTES: usize = 1_048_576 - 8;

/// Configuration for [`TxVotePool`](crate::TxVotePool).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of live transactions.
    pub max_txs: usize,
    /// Maximum size of a single transaction payload.
    pub max_tx_bytes: usize,
    /// Maximum number of log slots (live plus removed) kept before the oldest are evicted.
    pub max_retained: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_txs: 5000,
            max_tx_bytes: DEFAULT_MAX_TX_BYTES,
            max_retained: 10_000,
        }
    }
}

impl PoolConfig {
    /// Sets the maximum number of live transactions.
    #[must_use]
    pub const fn with_max_txs(mut self, max: usize) -> Self {
        self.max_txs = max;
        self
    }

    /// Sets the maximum transaction size.
    #[must_use]
    pub const fn with_max_tx_bytes(mut self, max: usize) -> Self {
        self.max_tx_bytes = max;
        self
    }

    /// Sets the retention window.
    #[must_use]
    pub const fn with_max_retained(mut self, max: usize) -> Self {
        self.max_retained = max;
        self
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> Result<Self, PoolError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| PoolError::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            PoolError::Config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_txs == 0 {
            return Err(PoolError::Config("max_txs must be positive".to_string()));
        }
        if self.max_tx_bytes == 0 {
            return Err(PoolError::Config("max_tx_bytes must be positive".to_string()));
        }
        if self.max_retained < self.max_txs {
            return Err(PoolError::Config(format!(
                "max_retained ({}) must be at least max_txs ({})",
                self.max_retained, self.max_txs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_tx_bytes, 1_048_568);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = PoolConfig::from_json(r#"{"max_txs": 10, "max_retained": 20}"#).expect("parse");
        assert_eq!(config.max_txs, 10);
        assert_eq!(config.max_retained, 20);
        assert_eq!(config.max_tx_bytes, DEFAULT_MAX_TX_BYTES);
    }

    #[test]
    fn retention_smaller_than_pool_is_rejected() {
        let config = PoolConfig::default().with_max_txs(100).with_max_retained(50);
        assert!(matches!(config.validate(), Err(PoolError::Config(_))));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(PoolConfig::default().with_max_txs(0).validate().is_err());
        assert!(PoolConfig::default().with_max_tx_bytes(0).validate().is_err());
        assert!(PoolConfig::from_json("not json").is_err());
    }
}
