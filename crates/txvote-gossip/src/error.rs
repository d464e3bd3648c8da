//! Error types for txvote-gossip.

use thiserror::Error;
use txvote_pool::PoolError;

/// Errors decoding an inbound frame. Either one is a peer fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame is larger than the configured maximum.
    #[error("msg exceeds max size ({size} > {max})")]
    FrameTooLarge {
        /// Length of the rejected frame.
        size: usize,
        /// Configured maximum frame size.
        max: usize,
    },

    /// Frame does not match any known message shape.
    #[error("unrecognized message: {0}")]
    UnrecognizedMessage(String),
}

/// Errors that can occur in gossip operations.
#[derive(Debug, Error)]
pub enum GossipError {
    /// Inbound frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The pool rejected a received transaction.
    #[error("tx rejected: {0}")]
    Rejected(#[from] PoolError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GossipError {
    /// Returns true if the error is the peer's fault and warrants disconnecting it.
    #[must_use]
    pub const fn is_peer_fault(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
