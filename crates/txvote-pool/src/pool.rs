//! The pending transaction pool.
//!
//! [`TxVotePool`] admits transactions after a size, duplicate, validity and
//! capacity check, and appends them to a [`TxLog`] that gossip routines walk.
//! Every entry remembers the peers known to already hold it.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::log::{Slot, TxLog};
use crate::types::{PeerId, TxInfo, TxVote, TxVoteId};

/// Application-level validity check run before a transaction is admitted.
pub trait TxValidator: Send + Sync {
    /// Returns a rejection reason if the transaction is invalid.
    ///
    /// # Errors
    ///
    /// Returns the reason the transaction is rejected.
    fn check(&self, tx: &TxVote) -> Result<(), String>;
}

/// Validator that admits every transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl TxValidator for AcceptAll {
    fn check(&self, _tx: &TxVote) -> Result<(), String> {
        Ok(())
    }
}

/// One pending transaction.
#[derive(Debug)]
pub struct PoolEntry {
    tx: TxVote,
    id: TxVoteId,
    height: u64,
    senders: RwLock<HashSet<PeerId>>,
}

impl PoolEntry {
    fn new(tx: TxVote, id: TxVoteId, height: u64, sender: PeerId) -> Self {
        let mut senders = HashSet::new();
        if !sender.is_unknown() {
            senders.insert(sender);
        }
        Self {
            tx,
            id,
            height,
            senders: RwLock::new(senders),
        }
    }

    /// The transaction payload.
    #[must_use]
    pub const fn tx(&self) -> &TxVote {
        &self.tx
    }

    /// The transaction id.
    #[must_use]
    pub const fn id(&self) -> TxVoteId {
        self.id
    }

    /// Pool height at which the transaction was admitted.
    #[must_use]
    pub const fn height(&self) -> u64 {
        self.height
    }

    /// Returns true if `peer` is known to hold this transaction.
    #[must_use]
    pub fn has_sender(&self, peer: PeerId) -> bool {
        self.senders.read().contains(&peer)
    }

    /// Records that `peer` holds this transaction. Returns true if newly recorded.
    pub fn add_sender(&self, peer: PeerId) -> bool {
        if peer.is_unknown() {
            return false;
        }
        self.senders.write().insert(peer)
    }

    /// Number of peers known to hold this transaction.
    #[must_use]
    pub fn sender_count(&self) -> usize {
        self.senders.read().len()
    }
}

/// Pool of pending transactions.
pub struct TxVotePool {
    config: PoolConfig,
    log: TxLog<PoolEntry>,
    /// Live transaction id to log position. Locked before the log.
    index: Mutex<HashMap<TxVoteId, u64>>,
    height: AtomicU64,
    validator: Arc<dyn TxValidator>,
}

impl std::fmt::Debug for TxVotePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxVotePool")
            .field("config", &self.config)
            .field("size", &self.size())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

impl TxVotePool {
    /// Creates a pool that admits every well-sized transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        Self::with_validator(config, Arc::new(AcceptAll))
    }

    /// Creates a pool with a custom validator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_validator(
        config: PoolConfig,
        validator: Arc<dyn TxValidator>,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        Ok(Self {
            log: TxLog::new(config.max_retained),
            config,
            index: Mutex::new(HashMap::new()),
            height: AtomicU64::new(0),
            validator,
        })
    }

    /// Returns the pool configuration.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Checks a transaction and admits it.
    ///
    /// A duplicate records `info.sender` on the pending entry before being rejected,
    /// so gossip will not echo it back to that peer.
    ///
    /// # Errors
    ///
    /// Returns a [`PoolError`] describing why the transaction was not admitted.
    pub fn check_tx(&self, tx: TxVote, info: TxInfo) -> Result<TxVoteId, PoolError> {
        if tx.len() > self.config.max_tx_bytes {
            return Err(PoolError::TxTooLarge {
                size: tx.len(),
                max: self.config.max_tx_bytes,
            });
        }

        let id = tx.id();
        let mut index = self.index.lock();
        if let Some(&position) = index.get(&id) {
            if let Slot::Ready(entry) = self.log.get(position) {
                entry.add_sender(info.sender);
            }
            return Err(PoolError::AlreadyInPool(id));
        }

        self.validator.check(&tx).map_err(PoolError::Invalid)?;

        if index.len() >= self.config.max_txs {
            return Err(PoolError::PoolFull {
                max: self.config.max_txs,
            });
        }

        let height = self.height();
        let appended = self.log.push(PoolEntry::new(tx, id, height, info.sender));
        index.insert(id, appended.position);
        for entry in appended.evicted {
            index.remove(&entry.id());
            warn!(tx = %entry.id(), height = entry.height(), "evicted pending tx past retention window");
        }
        debug!(tx = %id, height, sender = %info.sender, position = appended.position, "added tx");
        Ok(id)
    }

    /// Records a committed block: advances the height and drops its transactions.
    pub fn update(&self, height: u64, committed: &[TxVote]) {
        self.height.store(height, Ordering::Release);
        let mut index = self.index.lock();
        let mut removed = 0usize;
        for tx in committed {
            if let Some(position) = index.remove(&tx.id()) {
                if self.log.remove(position).is_some() {
                    removed += 1;
                }
            }
        }
        debug!(height, removed, remaining = index.len(), "updated pool");
    }

    /// Removes every pending transaction.
    pub fn flush(&self) {
        let mut index = self.index.lock();
        index.clear();
        let dropped = self.log.clear();
        debug!(dropped = dropped.len(), "flushed pool");
    }

    /// Number of pending transactions.
    #[must_use]
    pub fn size(&self) -> usize {
        self.index.lock().len()
    }

    /// Current pool height.
    #[must_use]
    pub fn height(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }

    /// Returns true if the transaction is pending.
    #[must_use]
    pub fn contains(&self, id: &TxVoteId) -> bool {
        self.index.lock().contains_key(id)
    }

    /// Returns the pending entry for a transaction id.
    #[must_use]
    pub fn get(&self, id: &TxVoteId) -> Option<Arc<PoolEntry>> {
        let index = self.index.lock();
        index.get(id).and_then(|&position| self.log.get(position).ready())
    }

    /// Position of the oldest pending entry.
    #[must_use]
    pub fn front(&self) -> Option<u64> {
        self.log.front()
    }

    /// Looks up a log position.
    #[must_use]
    pub fn entry(&self, position: u64) -> Slot<PoolEntry> {
        self.log.get(position)
    }

    /// Resolves once the pool holds at least one pending entry.
    pub async fn wait_for_entries(&self) {
        self.log.wait_for_entries().await;
    }

    /// Resolves once the position after `position` has been written.
    pub async fn wait_for_successor(&self, position: u64) {
        self.log.wait_for_successor(position).await;
    }
}
