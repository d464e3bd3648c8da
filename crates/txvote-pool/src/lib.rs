//! # txvote-pool
//!
//! Pending transaction (vote) pool consumed by the gossip layer.
//!
//! This crate provides:
//!
//! - [`PeerId`]: compact provenance identifier, `0` meaning "no peer"
//! - [`TxVote`] / [`TxVoteId`]: transaction payloads and their content hash
//! - [`TxLog`]: append-only log with successor notification and bounded retention
//! - [`TxVotePool`]: admission, commit and flush of pending transactions
//! - [`PoolConfig`]: pool limits

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod log;
pub mod pool;
pub mod types;

pub use config::{DEFAULT_MAX_TX_BYTES, PoolConfig};
pub use error::PoolError;
pub use log::{Appended, Slot, TxLog};
pub use pool::{AcceptAll, PoolEntry, TxValidator, TxVotePool};
pub use types::{PeerId, TxInfo, TxVote, TxVoteId};
