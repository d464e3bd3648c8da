//! Error types for txvote-pool.

use thiserror::Error;

use crate::types::TxVoteId;

/// Errors returned when a transaction cannot enter the pool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Transaction payload exceeds the configured ceiling.
    #[error("tx too large: {size} bytes (max {max})")]
    TxTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// Configured maximum payload size.
        max: usize,
    },

    /// Transaction is already pending.
    #[error("tx already in pool: {0}")]
    AlreadyInPool(TxVoteId),

    /// Pool holds the maximum number of live transactions.
    #[error("pool is full ({max} txs)")]
    PoolFull {
        /// Configured maximum number of live transactions.
        max: usize,
    },

    /// The validator rejected the transaction.
    #[error("invalid tx: {0}")]
    Invalid(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
