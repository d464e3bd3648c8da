//! # txvote-gossip
//!
//! Peer-to-peer gossip for the pending tx vote pool.
//!
//! This crate provides:
//!
//! - [`PeerIdRegistry`]: compact 16-bit identifiers for connected peers
//! - [`TxVoteCodec`]: size-bounded wire codec for [`TxVoteMessage`]
//! - Per-peer broadcast routines with catch-up and echo suppression
//! - [`GossipCoordinator`]: peer lifecycle and inbound message handling
//!
//! ## Collaborators
//!
//! - [`PendingPool`] / [`PendingEntry`]: the pool gossip reads and submits to,
//!   implemented for [`txvote_pool::TxVotePool`]
//! - [`Peer`]: a transport connection; [`ChannelPeer`] is an in-memory one
//! - [`PeerHeights`]: reported chain heights; [`PeerHeightTable`] is a shared table

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod broadcast;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod message;
pub mod peer;
pub mod pool;
pub mod protocol;
pub mod registry;

pub use config::GossipConfig;
pub use coordinator::GossipCoordinator;
pub use error::{DecodeError, GossipError};
pub use memory::{ChannelPeer, Frame};
pub use message::{
    DEFAULT_MAX_MSG_BYTES, ENVELOPE_OVERHEAD, TxMessage, TxVoteCodec, TxVoteMessage, WIRE_VERSION,
};
pub use peer::{Peer, PeerHeightTable, PeerHeights};
pub use pool::{PendingEntry, PendingPool};
pub use protocol::{ChannelDescriptor, NodeId, TXVOTE_CHANNEL};
pub use registry::{MAX_ACTIVE_IDS, PeerIdRegistry};
pub use txvote_pool::PeerId;
