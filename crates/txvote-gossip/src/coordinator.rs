//! Gossip lifecycle: peer registration, broadcast routines, inbound frames.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use txvote_pool::{PeerId, PoolError};

use crate::broadcast::BroadcastRoutine;
use crate::config::GossipConfig;
use crate::error::GossipError;
use crate::message::{TxVoteCodec, TxVoteMessage};
use crate::peer::{Peer, PeerHeights};
use crate::pool::PendingPool;
use crate::protocol::{ChannelDescriptor, NodeId, TXVOTE_CHANNEL};
use crate::registry::PeerIdRegistry;

/// Owns the peer ID registry and one broadcast routine per connected peer.
///
/// The networking layer calls [`add_peer`](Self::add_peer) and
/// [`remove_peer`](Self::remove_peer) as connections come and go, and hands
/// every frame on [`TXVOTE_CHANNEL`] to [`receive`](Self::receive).
pub struct GossipCoordinator<M: PendingPool> {
    config: GossipConfig,
    codec: TxVoteCodec,
    pool: Arc<M>,
    heights: Arc<dyn PeerHeights>,
    ids: PeerIdRegistry,
    shutdown: CancellationToken,
    running: AtomicBool,
    routines: Mutex<HashMap<NodeId, JoinHandle<()>>>,
    // Routines of removed peers, kept until they exit.
    retired: Mutex<Vec<JoinHandle<()>>>,
}

impl<M: PendingPool> std::fmt::Debug for GossipCoordinator<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GossipCoordinator")
            .field("config", &self.config)
            .field("peers", &self.ids.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl<M: PendingPool> GossipCoordinator<M> {
    /// Creates a coordinator over `pool`, reading peer heights from `heights`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: GossipConfig,
        pool: Arc<M>,
        heights: Arc<dyn PeerHeights>,
    ) -> Result<Self, GossipError> {
        Self::with_registry(config, pool, heights, PeerIdRegistry::new())
    }

    /// Creates a coordinator with a custom ID registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_registry(
        config: GossipConfig,
        pool: Arc<M>,
        heights: Arc<dyn PeerHeights>,
        ids: PeerIdRegistry,
    ) -> Result<Self, GossipError> {
        config.validate()?;
        Ok(Self {
            codec: TxVoteCodec::new(config.max_msg_bytes),
            config,
            pool,
            heights,
            ids,
            shutdown: CancellationToken::new(),
            running: AtomicBool::new(false),
            routines: Mutex::new(HashMap::new()),
            retired: Mutex::new(Vec::new()),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &GossipConfig {
        &self.config
    }

    /// Channels to register with the networking layer.
    #[must_use]
    pub fn channels(&self) -> Vec<ChannelDescriptor> {
        vec![ChannelDescriptor {
            id: TXVOTE_CHANNEL,
            priority: self.config.channel_priority,
        }]
    }

    /// Starts the coordinator. Peers added before this get no broadcast routine.
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        if !self.config.broadcast {
            info!("tx broadcasting is disabled");
        }
    }

    /// Returns true between [`start`](Self::start) and [`stop`](Self::stop).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.shutdown.is_cancelled()
    }

    /// Stops every broadcast routine and waits for them to exit.
    ///
    /// This includes routines of removed peers that have not yet observed
    /// their quit token.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
        let mut routines: Vec<_> = self.routines.lock().drain().map(|(_, h)| h).collect();
        routines.append(&mut self.retired.lock());
        for handle in routines {
            if let Err(e) = handle.await {
                warn!(error = %e, "tx broadcast routine panicked");
            }
        }
        info!("tx gossip stopped");
    }

    /// Registers a newly connected peer and starts its broadcast routine.
    ///
    /// Adding a peer that already has a live routine returns its ID and
    /// starts nothing. Safe to call concurrently for distinct peers. Must be
    /// called from within a Tokio runtime.
    pub fn add_peer(&self, peer: Arc<dyn Peer>) -> PeerId {
        let node = peer.node_id();
        let peer_id = self.ids.reserve(node);
        debug!(peer = %node, peer_id = %peer_id, "added peer");

        if !self.config.broadcast || !self.is_running() {
            return peer_id;
        }

        let mut routines = self.routines.lock();
        if routines.get(&node).is_some_and(|h| !h.is_finished()) {
            debug!(peer = %node, peer_id = %peer_id, "broadcast routine already running");
            return peer_id;
        }

        let routine = BroadcastRoutine::new(
            Arc::clone(&self.pool),
            peer,
            Arc::clone(&self.heights),
            peer_id,
            self.config.catchup_interval(),
            self.shutdown.clone(),
        );
        routines.insert(node, tokio::spawn(routine.run()));
        peer_id
    }

    /// Releases a disconnected peer's ID.
    ///
    /// The peer's routine exits on its own once it observes the peer's quit
    /// token, or at the latest on [`stop`](Self::stop).
    pub fn remove_peer(&self, node: &NodeId, reason: &str) {
        let reclaimed = self.ids.reclaim(node);
        let handle = self.routines.lock().remove(node);
        if let Some(handle) = handle {
            let mut retired = self.retired.lock();
            retired.retain(|h| !h.is_finished());
            if !handle.is_finished() {
                retired.push(handle);
            }
        }
        debug!(peer = %node, peer_id = ?reclaimed, reason, "removed peer");
    }

    /// Handles an inbound frame.
    ///
    /// A frame that fails to decode disconnects the peer. A transaction the
    /// pool rejects is logged and the connection is kept.
    ///
    /// # Errors
    ///
    /// Returns [`GossipError::Decode`] after stopping the peer, or
    /// [`GossipError::Rejected`] if the pool did not admit the transaction.
    pub fn receive(&self, channel: u8, peer: &dyn Peer, bytes: &[u8]) -> Result<(), GossipError> {
        let node = peer.node_id();
        if channel != TXVOTE_CHANNEL {
            warn!(peer = %node, channel, "frame on unexpected channel");
            return Ok(());
        }

        let message = match self.codec.decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                error!(peer = %node, channel, len = bytes.len(), error = %e, "error decoding message");
                let err = GossipError::Decode(e);
                peer.stop_for_error(&err);
                return Err(err);
            }
        };
        debug!(peer = %node, channel, msg = %message, "receive");

        match message {
            TxVoteMessage::Tx(msg) => {
                let tx_id = msg.tx.id();
                let peer_id = self.ids.lookup(&node);
                match self.pool.submit(msg.tx, peer_id) {
                    Ok(()) => {}
                    Err(e @ PoolError::AlreadyInPool(_)) => {
                        debug!(tx = %tx_id, peer = %node, "tx already in pool");
                        return Err(GossipError::Rejected(e));
                    }
                    Err(e) => {
                        info!(tx = %tx_id, peer = %node, error = %e, "could not check tx");
                        return Err(GossipError::Rejected(e));
                    }
                }
                // Broadcasting happens from the per-peer routines.
                Ok(())
            }
            TxVoteMessage::Unknown { msg_type } => {
                error!(peer = %node, msg_type, "unknown message type");
                Ok(())
            }
        }
    }

    /// ID reserved for `node`, or [`PeerId::UNKNOWN`].
    #[must_use]
    pub fn peer_id(&self, node: &NodeId) -> PeerId {
        self.ids.lookup(node)
    }

    /// Number of registered peers.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.ids.len()
    }

    /// The pool gossip reads from.
    #[must_use]
    pub const fn pool(&self) -> &Arc<M> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ChannelPeer;
    use crate::peer::PeerHeightTable;
    use std::time::Duration;
    use txvote_pool::{PoolConfig, PoolError, TxVote, TxVotePool};

    fn node(n: u8) -> NodeId {
        NodeId::from_bytes([n; 32])
    }

    fn coordinator(config: GossipConfig) -> GossipCoordinator<TxVotePool> {
        let pool = Arc::new(TxVotePool::new(PoolConfig::default().with_max_tx_bytes(64)).expect("pool"));
        GossipCoordinator::new(config, pool, Arc::new(PeerHeightTable::new())).expect("coordinator")
    }

    #[test]
    fn reports_single_channel() {
        let c = coordinator(GossipConfig::default());
        assert_eq!(
            c.channels(),
            vec![ChannelDescriptor {
                id: TXVOTE_CHANNEL,
                priority: 5
            }]
        );
    }

    #[test]
    fn rejects_invalid_config() {
        let pool = Arc::new(TxVotePool::new(PoolConfig::default()).expect("pool"));
        let result = GossipCoordinator::new(
            GossipConfig::default().with_max_msg_bytes(0),
            pool,
            Arc::new(PeerHeightTable::new()),
        );
        assert!(matches!(result, Err(GossipError::Config(_))));
    }

    #[tokio::test]
    async fn peers_get_sequential_ids() {
        let c = coordinator(GossipConfig::default());
        c.start();
        let (a, _rx_a) = ChannelPeer::new(node(1));
        let (b, _rx_b) = ChannelPeer::new(node(2));

        assert_eq!(c.add_peer(a), PeerId::new(1));
        assert_eq!(c.add_peer(b), PeerId::new(2));
        assert_eq!(c.peer_count(), 2);

        c.remove_peer(&node(1), "test");
        assert_eq!(c.peer_id(&node(1)), PeerId::UNKNOWN);
        assert_eq!(c.peer_id(&node(2)), PeerId::new(2));
        // Removing twice is harmless.
        c.remove_peer(&node(1), "test");
        assert_eq!(c.peer_count(), 1);
        c.stop().await;
    }

    #[tokio::test]
    async fn received_tx_carries_provenance() {
        let c = coordinator(GossipConfig::default());
        c.start();
        let (a, _rx) = ChannelPeer::new(node(1));
        let id = c.add_peer(a.clone());

        let bytes = TxVoteCodec::encode(&TxVoteMessage::tx(b"vote".to_vec()));
        c.receive(TXVOTE_CHANNEL, a.as_ref(), &bytes).expect("accepted");

        let entry = c.pool().get(&TxVote::from(&b"vote"[..]).id()).expect("pending");
        assert!(entry.has_sender(id));
        c.stop().await;
    }

    #[tokio::test]
    async fn malformed_frame_stops_peer() {
        let c = coordinator(GossipConfig::default());
        c.start();
        let (a, _rx) = ChannelPeer::new(node(1));
        c.add_peer(a.clone());

        let result = c.receive(TXVOTE_CHANNEL, a.as_ref(), &[0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(GossipError::Decode(_))));
        assert!(a.is_stopped());
        assert!(a.stop_reason().is_some());
        assert_eq!(c.pool().size(), 0);
        c.stop().await;
    }

    #[tokio::test]
    async fn oversize_frame_stops_peer() {
        let c = coordinator(GossipConfig::default().with_max_msg_bytes(32));
        let (a, _rx) = ChannelPeer::new(node(1));
        c.add_peer(a.clone());

        let result = c.receive(TXVOTE_CHANNEL, a.as_ref(), &[0u8; 33]);
        assert!(matches!(
            result,
            Err(GossipError::Decode(crate::DecodeError::FrameTooLarge { size: 33, max: 32 }))
        ));
        assert!(a.is_stopped());
    }

    #[tokio::test]
    async fn pool_rejection_keeps_peer() {
        let c = coordinator(GossipConfig::default());
        let (a, _rx) = ChannelPeer::new(node(1));
        c.add_peer(a.clone());

        // Pool only takes 64-byte txs.
        let bytes = TxVoteCodec::encode(&TxVoteMessage::tx(vec![1u8; 65]));
        let result = c.receive(TXVOTE_CHANNEL, a.as_ref(), &bytes);
        assert!(matches!(
            result,
            Err(GossipError::Rejected(PoolError::TxTooLarge { .. }))
        ));
        assert!(!a.is_stopped());

        // So does a duplicate.
        let bytes = TxVoteCodec::encode(&TxVoteMessage::tx(b"vote".to_vec()));
        assert!(c.receive(TXVOTE_CHANNEL, a.as_ref(), &bytes).is_ok());
        assert!(matches!(
            c.receive(TXVOTE_CHANNEL, a.as_ref(), &bytes),
            Err(GossipError::Rejected(PoolError::AlreadyInPool(_)))
        ));
        assert!(!a.is_stopped());
    }

    #[tokio::test]
    async fn unknown_message_is_ignored() {
        let c = coordinator(GossipConfig::default());
        let (a, _rx) = ChannelPeer::new(node(1));
        c.add_peer(a.clone());

        let bytes = TxVoteCodec::encode(&TxVoteMessage::Unknown { msg_type: 99 });
        assert!(c.receive(TXVOTE_CHANNEL, a.as_ref(), &bytes).is_ok());
        assert!(!a.is_stopped());
        assert_eq!(c.pool().size(), 0);
    }

    #[tokio::test]
    async fn other_channels_are_ignored() {
        let c = coordinator(GossipConfig::default());
        let (a, _rx) = ChannelPeer::new(node(1));
        assert!(c.receive(0x20, a.as_ref(), &[0xff]).is_ok());
        assert!(!a.is_stopped());
    }

    #[tokio::test]
    async fn disabled_broadcast_sends_nothing() {
        let heights = Arc::new(PeerHeightTable::new());
        heights.set_height(node(1), 0);
        let pool = Arc::new(TxVotePool::new(PoolConfig::default()).expect("pool"));
        let c = GossipCoordinator::new(GossipConfig::default().with_broadcast(false), pool, heights)
            .expect("coordinator");
        c.start();
        let (a, mut rx) = ChannelPeer::new(node(1));
        assert_eq!(c.add_peer(a), PeerId::new(1));

        c.pool()
            .check_tx(TxVote::from(&b"vote"[..]), txvote_pool::TxInfo::local())
            .expect("admitted");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        c.stop().await;
    }

    #[tokio::test]
    async fn stop_ends_routines() {
        let c = coordinator(GossipConfig::default());
        c.start();
        assert!(c.is_running());
        let (a, _rx) = ChannelPeer::new(node(1));
        c.add_peer(a);

        tokio::time::timeout(Duration::from_secs(1), c.stop())
            .await
            .expect("stopped");
        assert!(!c.is_running());
    }

    #[tokio::test]
    async fn re_adding_peer_keeps_one_routine() {
        let heights = Arc::new(PeerHeightTable::new());
        heights.set_height(node(1), 0);
        let pool = Arc::new(TxVotePool::new(PoolConfig::default()).expect("pool"));
        let config = GossipConfig::default().with_catchup_interval(Duration::from_millis(10));
        let c = GossipCoordinator::new(config, pool, heights).expect("coordinator");
        c.start();

        let (a, mut rx) = ChannelPeer::new(node(1));
        assert_eq!(c.add_peer(a.clone()), PeerId::new(1));
        assert_eq!(c.add_peer(a.clone()), PeerId::new(1));
        assert_eq!(c.routines.lock().len(), 1);

        c.pool()
            .check_tx(TxVote::from(&b"vote"[..]), txvote_pool::TxInfo::local())
            .expect("admitted");
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("delivered")
            .expect("frame");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "tx delivered twice");
        c.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_add_peer_assigns_unique_ids() {
        let c = Arc::new(coordinator(GossipConfig::default()));
        c.start();

        let tasks: Vec<_> = (0..8u8)
            .map(|t| {
                let c = Arc::clone(&c);
                tokio::spawn(async move {
                    let mut ids = Vec::new();
                    for i in 0..25u8 {
                        let mut bytes = [0u8; 32];
                        bytes[0] = t;
                        bytes[1] = i;
                        let (peer, _rx) = ChannelPeer::new(NodeId::from_bytes(bytes));
                        ids.push(c.add_peer(peer));
                    }
                    ids
                })
            })
            .collect();

        let mut seen = std::collections::HashSet::new();
        for task in tasks {
            for id in task.await.expect("task") {
                assert!(!id.is_unknown());
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 200);
        assert_eq!(c.peer_count(), 200);
        assert!(seen.iter().all(|id| id.get() <= 200));
        c.stop().await;
    }

    #[tokio::test]
    async fn stop_awaits_routines_of_removed_peers() {
        let c = coordinator(GossipConfig::default());
        c.start();
        let (a, _rx) = ChannelPeer::new(node(1));
        c.add_peer(a.clone());

        // The transport never signals quit for this peer.
        c.remove_peer(&node(1), "test");
        assert_eq!(c.retired.lock().len(), 1);
        assert!(Arc::strong_count(&a) > 1);

        tokio::time::timeout(Duration::from_secs(1), c.stop())
            .await
            .expect("stopped");
        assert!(c.retired.lock().is_empty());
        assert_eq!(Arc::strong_count(&a), 1);
    }
}
