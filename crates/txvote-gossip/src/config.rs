//! Gossip configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::GossipError;
use crate::message::{DEFAULT_MAX_MSG_BYTES, ENVELOPE_OVERHEAD};
use crate::protocol::DEFAULT_CHANNEL_PRIORITY;

/// Configuration for the [`GossipCoordinator`](crate::GossipCoordinator).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GossipConfig {
    /// Whether pending txs are broadcast to peers.
    pub broadcast: bool,
    /// Maximum inbound frame size, envelope included.
    pub max_msg_bytes: usize,
    /// Pause before retrying a peer that is not ready, behind, or backpressured.
    pub catchup_interval_ms: u64,
    /// Send priority of the gossip channel.
    pub channel_priority: u8,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            broadcast: true,
            max_msg_bytes: DEFAULT_MAX_MSG_BYTES,
            catchup_interval_ms: 100,
            channel_priority: DEFAULT_CHANNEL_PRIORITY,
        }
    }
}

impl GossipConfig {
    /// Enables or disables broadcasting.
    #[must_use]
    pub const fn with_broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast = broadcast;
        self
    }

    /// Sets the maximum frame size.
    #[must_use]
    pub const fn with_max_msg_bytes(mut self, max: usize) -> Self {
        self.max_msg_bytes = max;
        self
    }

    /// Sets the catch-up interval.
    #[must_use]
    pub const fn with_catchup_interval(mut self, interval: Duration) -> Self {
        self.catchup_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Catch-up interval as a [`Duration`].
    #[must_use]
    pub const fn catchup_interval(&self) -> Duration {
        Duration::from_millis(self.catchup_interval_ms)
    }

    /// Largest tx payload that fits in a frame.
    #[must_use]
    pub const fn max_tx_bytes(&self) -> usize {
        self.max_msg_bytes.saturating_sub(ENVELOPE_OVERHEAD)
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> Result<Self, GossipError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| GossipError::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GossipError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<(), GossipError> {
        if self.max_msg_bytes <= ENVELOPE_OVERHEAD {
            return Err(GossipError::Config(format!(
                "max_msg_bytes must exceed the {ENVELOPE_OVERHEAD}-byte envelope"
            )));
        }
        if self.catchup_interval_ms == 0 {
            return Err(GossipError::Config(
                "catchup_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
