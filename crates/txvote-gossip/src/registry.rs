//! Compact peer identifier allocation.
//!
//! Every connected peer is assigned a [`PeerId`] so pending entries can record
//! provenance in two bytes per sender. `0` is never handed out: it stands for
//! "no peer" and stays permanently active.
//!
//! Allocation always returns the smallest unused identifier without scanning
//! the active set: reclaimed identifiers go to an ordered free set, and a
//! persistent high-water cursor marks where never-used identifiers begin.
//! Running out of identifiers is an operational limit of the node, reported by
//! a panic rather than an error.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use txvote_pool::PeerId;

use crate::protocol::NodeId;

/// Maximum number of simultaneously active non-zero identifiers.
pub const MAX_ACTIVE_IDS: usize = u16::MAX as usize;

#[derive(Debug)]
struct Ids {
    peer_map: HashMap<NodeId, PeerId>,
    /// Always contains `0`.
    active: HashSet<u16>,
    /// Reclaimed identifiers below `next_id`.
    free: BTreeSet<u16>,
    /// Smallest identifier never handed out.
    next_id: u32,
}

impl Ids {
    /// Returns the smallest unused ID.
    #[allow(clippy::panic)]
    fn next_peer_id(&mut self, max_active: usize) -> PeerId {
        if self.active.len() > max_active {
            panic!("node has maximum {max_active} active IDs and wanted to get one more");
        }
        if let Some(id) = self.free.pop_first() {
            return PeerId::new(id);
        }
        let Ok(id) = u16::try_from(self.next_id) else {
            panic!("peer id cursor {} ran past the 16-bit range", self.next_id);
        };
        self.next_id += 1;
        PeerId::new(id)
    }
}

/// Bidirectional map between connected peers and their [`PeerId`].
#[derive(Debug)]
pub struct PeerIdRegistry {
    ids: RwLock<Ids>,
    max_active: usize,
}

impl Default for PeerIdRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerIdRegistry {
    /// Creates a registry with the full 16-bit identifier space.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_ACTIVE_IDS)
    }

    /// Creates a registry that allows at most `max_active` peers (capped at [`MAX_ACTIVE_IDS`]).
    #[must_use]
    pub fn with_capacity(max_active: usize) -> Self {
        let mut active = HashSet::new();
        active.insert(PeerId::UNKNOWN.get());
        Self {
            ids: RwLock::new(Ids {
                peer_map: HashMap::new(),
                active,
                free: BTreeSet::new(),
                next_id: 1,
            }),
            max_active: max_active.min(MAX_ACTIVE_IDS),
        }
    }

    /// Assigns the next unused ID to `node`.
    ///
    /// A node that already holds an ID keeps it.
    ///
    /// # Panics
    ///
    /// Panics if every identifier is in use.
    pub fn reserve(&self, node: NodeId) -> PeerId {
        let mut ids = self.ids.write();
        if let Some(&existing) = ids.peer_map.get(&node) {
            return existing;
        }
        let id = ids.next_peer_id(self.max_active);
        ids.peer_map.insert(node, id);
        ids.active.insert(id.get());
        id
    }

    /// Returns the ID reserved for `node` to the unused pool.
    pub fn reclaim(&self, node: &NodeId) -> Option<PeerId> {
        let mut ids = self.ids.write();
        let removed = ids.peer_map.remove(node)?;
        ids.active.remove(&removed.get());
        ids.free.insert(removed.get());
        Some(removed)
    }

    /// Returns the ID reserved for `node`, or [`PeerId::UNKNOWN`] if none.
    #[must_use]
    pub fn lookup(&self, node: &NodeId) -> PeerId {
        self.ids
            .read()
            .peer_map
            .get(node)
            .copied()
            .unwrap_or(PeerId::UNKNOWN)
    }

    /// Returns true if `id` is currently allocated. Always true for `0`.
    #[must_use]
    pub fn is_active(&self, id: PeerId) -> bool {
        self.ids.read().active.contains(&id.get())
    }

    /// Number of peers holding an ID.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.read().peer_map.len()
    }

    /// Returns true if no peer holds an ID.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of simultaneously registered peers.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_active
    }
}
