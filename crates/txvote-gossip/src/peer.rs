//! Capabilities the gossip layer needs from the transport and from height tracking.

use parking_lot::RwLock;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::error::GossipError;
use crate::protocol::NodeId;

/// A connected peer as exposed by the transport.
pub trait Peer: Send + Sync + 'static {
    /// Connection identity.
    fn node_id(&self) -> NodeId;

    /// Queues a frame without blocking. Returns false if the peer cannot take it now.
    fn try_send(&self, channel: u8, bytes: Vec<u8>) -> bool;

    /// Token cancelled when the connection shuts down.
    fn quit_token(&self) -> CancellationToken;

    /// Disconnects the peer because of a protocol violation.
    fn stop_for_error(&self, reason: &GossipError);
}

/// Read-only view of the chain height each peer last reported.
///
/// Height tracking is owned by another subsystem that may not have seen a
/// freshly connected peer yet; `None` means "not known yet", not an error.
pub trait PeerHeights: Send + Sync + 'static {
    /// Last height reported by `node`, if any.
    fn reported_height(&self, node: &NodeId) -> Option<u64>;
}

/// Shared table of reported peer heights.
#[derive(Debug, Default)]
pub struct PeerHeightTable {
    heights: RwLock<HashMap<NodeId, u64>>,
}

impl PeerHeightTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the height `node` reported.
    pub fn set_height(&self, node: NodeId, height: u64) {
        self.heights.write().insert(node, height);
    }

    /// Forgets `node`.
    pub fn remove(&self, node: &NodeId) {
        self.heights.write().remove(node);
    }
}

impl PeerHeights for PeerHeightTable {
    fn reported_height(&self, node: &NodeId) -> Option<u64> {
        self.heights.read().get(node).copied()
    }
}
