//! Per-peer broadcast routine.
//!
//! One routine runs for every connected peer. It walks the pool's log from
//! the oldest pending entry onward and sends each entry the peer may need:
//!
//! - the peer must have reported a height, and be at most one block behind
//!   the height the entry was admitted at;
//! - entries the peer is known to hold (usually because it sent them) are
//!   skipped, not sent back;
//! - a send the peer cannot take is retried after the catch-up interval.
//!
//! The routine never blocks longer than the catch-up interval without
//! observing both the coordinator's shutdown token and the peer's quit token.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use txvote_pool::{PeerId, Slot};

use crate::message::TxVoteCodec;
use crate::peer::{Peer, PeerHeights};
use crate::pool::{PendingEntry, PendingPool};
use crate::protocol::TXVOTE_CHANNEL;

/// What happened when the routine offered an entry to its peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Frame queued on the peer.
    Sent,
    /// Peer already holds the entry.
    AlreadyHeld,
    /// No reported height for the peer yet.
    PeerNotReady,
    /// Peer lags the entry by more than one block.
    PeerBehind,
    /// Peer could not take the frame.
    Backpressure,
}

impl Delivery {
    /// Returns true if the same entry must be offered again after a pause.
    pub(crate) const fn is_retry(self) -> bool {
        matches!(self, Self::PeerNotReady | Self::PeerBehind | Self::Backpressure)
    }
}

/// Streams pending entries to one peer.
pub(crate) struct BroadcastRoutine<M: PendingPool> {
    pool: Arc<M>,
    peer: Arc<dyn Peer>,
    heights: Arc<dyn PeerHeights>,
    peer_id: PeerId,
    catchup_interval: Duration,
    shutdown: CancellationToken,
}

impl<M: PendingPool> BroadcastRoutine<M> {
    pub(crate) fn new(
        pool: Arc<M>,
        peer: Arc<dyn Peer>,
        heights: Arc<dyn PeerHeights>,
        peer_id: PeerId,
        catchup_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pool,
            peer,
            heights,
            peer_id,
            catchup_interval,
            shutdown,
        }
    }

    /// Runs until the coordinator shuts down or the peer quits.
    pub(crate) async fn run(self) {
        let node = self.peer.node_id();
        let quit = self.peer.quit_token();
        debug!(peer = %node, peer_id = %self.peer_id, "tx broadcast routine started");

        let mut cursor: Option<u64> = None;
        loop {
            if self.shutdown.is_cancelled() || quit.is_cancelled() {
                break;
            }

            let position = if let Some(position) = cursor {
                position
            } else {
                tokio::select! {
                    () = self.pool.wait_for_entries() => {}
                    () = quit.cancelled() => break,
                    () = self.shutdown.cancelled() => break,
                }
                let Some(front) = self.pool.front() else {
                    continue;
                };
                cursor = Some(front);
                front
            };

            match self.pool.entry(position) {
                Slot::Ready(entry) => {
                    let delivery = self.deliver(entry.as_ref());
                    if delivery.is_retry() {
                        trace!(peer = %node, position, ?delivery, "retrying after catch-up interval");
                        if !self.pause(&quit).await {
                            break;
                        }
                        continue;
                    }
                    trace!(peer = %node, position, ?delivery, "offered tx");
                }
                Slot::Removed => {}
                Slot::Evicted | Slot::Pending => {
                    // Entry was pruned out from under the cursor.
                    cursor = None;
                    continue;
                }
            }

            tokio::select! {
                () = self.pool.wait_for_successor(position) => {
                    cursor = Some(position + 1);
                }
                () = quit.cancelled() => break,
                () = self.shutdown.cancelled() => break,
            }
        }

        debug!(peer = %node, peer_id = %self.peer_id, "tx broadcast routine stopped");
    }

    /// Applies catch-up and echo rules, then tries to send.
    pub(crate) fn deliver(&self, entry: &M::Entry) -> Delivery {
        let Some(peer_height) = self.heights.reported_height(&self.peer.node_id()) else {
            return Delivery::PeerNotReady;
        };
        // Allow for a lag of one block.
        if peer_height.saturating_add(1) < entry.height() {
            return Delivery::PeerBehind;
        }
        if entry.has_sender(self.peer_id) {
            return Delivery::AlreadyHeld;
        }
        if self
            .peer
            .try_send(TXVOTE_CHANNEL, TxVoteCodec::encode_tx(entry.payload()))
        {
            Delivery::Sent
        } else {
            Delivery::Backpressure
        }
    }

    /// Sleeps one catch-up interval. Returns false if shutdown arrived first.
    async fn pause(&self, quit: &CancellationToken) -> bool {
        tokio::select! {
            () = tokio::time::sleep(self.catchup_interval) => true,
            () = quit.cancelled() => false,
            () = self.shutdown.cancelled() => false,
        }
    }
}
