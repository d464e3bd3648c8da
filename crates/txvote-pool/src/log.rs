//! Append-only log of pending entries.
//!
//! Entries are addressed by an absolute `u64` position that never changes
//! once written. Consumers hold a position as their cursor and wait on the
//! log for either a first live entry or the write of their successor.
//!
//! Removing an entry leaves a tombstone so later positions stay valid. Slots
//! are dropped only from the front of the window: leading tombstones are
//! pruned on every removal, and the oldest slots are evicted whenever the
//! retained window grows past `max_retained`. A cursor that falls behind the
//! front observes [`Slot::Evicted`] and restarts from [`TxLog::front`].

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::watch;

/// What a consumer finds at a log position.
#[derive(Debug)]
pub enum Slot<T> {
    /// A live entry.
    Ready(Arc<T>),
    /// The entry was removed; skip it and advance.
    Removed,
    /// The position is behind the pruned front of the log.
    Evicted,
    /// Nothing has been written at this position yet.
    Pending,
}

impl<T> Slot<T> {
    /// Returns the live entry, if any.
    #[must_use]
    pub fn ready(self) -> Option<Arc<T>> {
        match self {
            Self::Ready(entry) => Some(entry),
            _ => None,
        }
    }
}

/// Retained slots. `slots[i]` holds position `base + i`; `None` is a tombstone.
#[derive(Debug)]
struct Window<T> {
    base: u64,
    slots: VecDeque<Option<Arc<T>>>,
    live: usize,
}

impl<T> Window<T> {
    fn end(&self) -> u64 {
        self.base + self.slots.len() as u64
    }

    fn prune_tombstones(&mut self) {
        while matches!(self.slots.front(), Some(None)) {
            self.slots.pop_front();
            self.base += 1;
        }
    }
}

/// Result of appending to the log.
#[derive(Debug)]
pub struct Appended<T> {
    /// Position of the new entry.
    pub position: u64,
    /// Live entries that were evicted to keep the window within bounds.
    pub evicted: Vec<Arc<T>>,
}

/// Append-only, notifiable, bounded-retention log.
#[derive(Debug)]
pub struct TxLog<T> {
    max_retained: usize,
    window: RwLock<Window<T>>,
    /// Next write position.
    written: watch::Sender<u64>,
}

impl<T> TxLog<T> {
    /// Creates an empty log retaining at most `max_retained` slots.
    #[must_use]
    pub fn new(max_retained: usize) -> Self {
        let (written, _) = watch::channel(0);
        Self {
            max_retained: max_retained.max(1),
            window: RwLock::new(Window {
                base: 0,
                slots: VecDeque::new(),
                live: 0,
            }),
            written,
        }
    }

    /// Appends an entry and wakes every waiting consumer.
    pub fn push(&self, value: T) -> Appended<T> {
        let (position, evicted, end) = {
            let mut window = self.window.write();
            let position = window.end();
            window.slots.push_back(Some(Arc::new(value)));
            window.live += 1;

            let mut evicted = Vec::new();
            while window.slots.len() > self.max_retained {
                if let Some(Some(entry)) = window.slots.pop_front() {
                    window.live -= 1;
                    evicted.push(entry);
                }
                window.base += 1;
            }
            window.prune_tombstones();
            (position, evicted, window.end())
        };
        self.written.send_replace(end);
        Appended { position, evicted }
    }

    /// Turns the entry at `position` into a tombstone and returns it.
    pub fn remove(&self, position: u64) -> Option<Arc<T>> {
        let mut window = self.window.write();
        let index = usize::try_from(position.checked_sub(window.base)?).ok()?;
        let entry = window.slots.get_mut(index)?.take()?;
        window.live -= 1;
        window.prune_tombstones();
        Some(entry)
    }

    /// Removes every live entry. Positions already written stay evicted.
    pub fn clear(&self) -> Vec<Arc<T>> {
        let mut window = self.window.write();
        let end = window.end();
        let drained = window.slots.drain(..).flatten().collect();
        window.base = end;
        window.live = 0;
        drained
    }

    /// Looks up a position.
    #[must_use]
    pub fn get(&self, position: u64) -> Slot<T> {
        let window = self.window.read();
        if position < window.base {
            return Slot::Evicted;
        }
        let Ok(index) = usize::try_from(position - window.base) else {
            return Slot::Pending;
        };
        match window.slots.get(index) {
            Some(Some(entry)) => Slot::Ready(Arc::clone(entry)),
            Some(None) => Slot::Removed,
            None => Slot::Pending,
        }
    }

    /// Position of the oldest live entry.
    #[must_use]
    pub fn front(&self) -> Option<u64> {
        let window = self.window.read();
        // Leading tombstones are always pruned, so the front slot is live.
        window.slots.front().map(|_| window.base)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.read().live
    }

    /// Returns true if there are no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of retained slots, live and tombstoned.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.window.read().slots.len()
    }

    /// Next position that will be written.
    #[must_use]
    pub fn end(&self) -> u64 {
        *self.written.borrow()
    }

    /// Resolves once the log holds at least one live entry.
    pub async fn wait_for_entries(&self) {
        let mut rx = self.written.subscribe();
        while self.is_empty() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Resolves once `position + 1` has been written.
    pub async fn wait_for_successor(&self, position: u64) {
        let mut rx = self.written.subscribe();
        let _ = rx.wait_for(|end| *end > position.saturating_add(1)).await;
    }
}
