//! Wire protocol definitions.
//!
//! - [`NodeId`]: opaque identity of a peer connection
//! - [`TXVOTE_CHANNEL`]: the channel tag gossip frames travel on
//! - [`ChannelDescriptor`]: channel registration for the networking layer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel tag identifying tx vote gossip frames.
pub const TXVOTE_CHANNEL: u8 = 0x31;

/// Default send priority of [`TXVOTE_CHANNEL`].
pub const DEFAULT_CHANNEL_PRIORITY: u8 = 5;

/// Identity of a peer connection as reported by the transport.
///
/// The bytes are the peer's 32-byte public key and display as base58.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    bytes: [u8; 32],
}

impl NodeId {
    /// Creates a `NodeId` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Returns the raw bytes of the node ID.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.bytes).into_string())
    }
}

impl From<[u8; 32]> for NodeId {
    fn from(bytes: [u8; 32]) -> Self {
        Self::from_bytes(bytes)
    }
}

/// A channel the gossip layer asks the networking framework to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelDescriptor {
    /// Channel tag.
    pub id: u8,
    /// Relative send priority.
    pub priority: u8,
}
