//! Core pool types.
//!
//! - [`PeerId`]: compact 16-bit identifier for a connected peer
//! - [`TxVote`]: raw transaction payload
//! - [`TxVoteId`]: content hash of a transaction
//! - [`TxInfo`]: provenance attached to a submitted transaction

use serde::{Deserialize, Serialize};
use std::fmt;

/// Compact identifier of a connected peer, used to track who supplied a transaction.
///
/// `0` is reserved for [`PeerId::UNKNOWN`]: a transaction that did not arrive
/// from the network (e.g. submitted over RPC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PeerId(u16);

impl PeerId {
    /// No originating peer.
    pub const UNKNOWN: Self = Self(0);

    /// Creates a `PeerId` from its raw value.
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw 16-bit value.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Returns true for the reserved "no peer" value.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for PeerId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

/// A raw transaction (vote) payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxVote(Vec<u8>);

impl TxVote {
    /// Wraps raw bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the content hash of this transaction.
    #[must_use]
    pub fn id(&self) -> TxVoteId {
        TxVoteId::of(&self.0)
    }

    /// Consumes the transaction and returns its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for TxVote {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for TxVote {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// BLAKE3 hash identifying a transaction by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxVoteId([u8; 32]);

impl TxVoteId {
    /// Hashes a raw payload.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Returns the raw hash bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxVoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

/// Provenance of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxInfo {
    /// Peer the transaction was received from, or [`PeerId::UNKNOWN`].
    pub sender: PeerId,
}

impl TxInfo {
    /// Provenance for a transaction received from `sender`.
    #[must_use]
    pub const fn from_peer(sender: PeerId) -> Self {
        Self { sender }
    }

    /// Provenance for a locally submitted transaction.
    #[must_use]
    pub const fn local() -> Self {
        Self {
            sender: PeerId::UNKNOWN,
        }
    }
}
