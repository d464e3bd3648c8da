//! The pending pool as seen by the gossip layer.

use std::future::Future;
use txvote_pool::{PeerId, PoolEntry, PoolError, Slot, TxInfo, TxVote, TxVotePool};

/// One pending entry.
pub trait PendingEntry: Send + Sync + 'static {
    /// Height at which the entry was admitted.
    fn height(&self) -> u64;

    /// Raw transaction bytes.
    fn payload(&self) -> &[u8];

    /// Returns true if `peer` is known to already hold this entry.
    fn has_sender(&self, peer: PeerId) -> bool;
}

/// Pool operations the gossip layer consumes.
pub trait PendingPool: Send + Sync + 'static {
    /// Entry type stored in the log.
    type Entry: PendingEntry;

    /// Checks and admits a transaction received from `sender`.
    ///
    /// # Errors
    ///
    /// Returns the pool's reason for rejecting the transaction.
    fn submit(&self, tx: TxVote, sender: PeerId) -> Result<(), PoolError>;

    /// Position of the oldest pending entry.
    fn front(&self) -> Option<u64>;

    /// Looks up a log position.
    fn entry(&self, position: u64) -> Slot<Self::Entry>;

    /// Resolves once at least one entry is pending.
    fn wait_for_entries(&self) -> impl Future<Output = ()> + Send;

    /// Resolves once the entry after `position` has been written.
    fn wait_for_successor(&self, position: u64) -> impl Future<Output = ()> + Send;
}

impl PendingEntry for PoolEntry {
    fn height(&self) -> u64 {
        PoolEntry::height(self)
    }

    fn payload(&self) -> &[u8] {
        self.tx().as_bytes()
    }

    fn has_sender(&self, peer: PeerId) -> bool {
        PoolEntry::has_sender(self, peer)
    }
}

impl PendingPool for TxVotePool {
    type Entry = PoolEntry;

    fn submit(&self, tx: TxVote, sender: PeerId) -> Result<(), PoolError> {
        self.check_tx(tx, TxInfo::from_peer(sender)).map(|_| ())
    }

    fn front(&self) -> Option<u64> {
        TxVotePool::front(self)
    }

    fn entry(&self, position: u64) -> Slot<PoolEntry> {
        TxVotePool::entry(self, position)
    }

    fn wait_for_entries(&self) -> impl Future<Output = ()> + Send {
        TxVotePool::wait_for_entries(self)
    }

    fn wait_for_successor(&self, position: u64) -> impl Future<Output = ()> + Send {
        TxVotePool::wait_for_successor(self, position)
    }
}
