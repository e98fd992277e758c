//! # Round-State Cache
//!
//! Priority-bounded map from block id to the round state known for it:
//! either a finished summary or a live [`Justifier`] that can be extended by
//! a child block. Priority is the block number, so the lowest blocks are
//! evicted first.
//!
//! A live justifier is handed out by value ([`RoundStateCache::take_justifier`])
//! and its slot is downgraded to a summary, so two branches forking from the
//! same parent never extend the same tally.

use crate::domain::justifier::{BftState, Justifier};
use shared_types::BlockId;
use std::collections::{BTreeSet, HashMap};

/// Cached round state for one block.
#[derive(Clone, Debug)]
pub enum RoundEntry {
    /// Tally still open at this block
    InProgress(Justifier),
    /// State fixed for this block
    Completed(BftState),
}

impl RoundEntry {
    fn state(&self, number: u32) -> BftState {
        match self {
            Self::InProgress(js) => js.state_at(number),
            Self::Completed(state) => *state,
        }
    }
}

/// Hit/miss counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Eviction-priority cache of round state.
#[derive(Debug)]
pub struct RoundStateCache {
    capacity: usize,
    entries: HashMap<BlockId, RoundEntry>,
    order: BTreeSet<(u32, BlockId)>,
    hits: u64,
    misses: u64,
}

impl RoundStateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: BTreeSet::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// State recorded for `id`, if any.
    pub fn get_state(&mut self, id: &BlockId) -> Option<BftState> {
        match self.entries.get(id) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.state(id.number()))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Take ownership of the live justifier stored for `id`.
    ///
    /// The slot keeps the block's state as a completed summary.
    pub fn take_justifier(&mut self, id: &BlockId) -> Option<Justifier> {
        match self.entries.remove(id) {
            Some(RoundEntry::InProgress(js)) => {
                let state = js.state_at(id.number());
                self.entries.insert(*id, RoundEntry::Completed(state));
                Some(js)
            }
            Some(completed) => {
                self.entries.insert(*id, completed);
                None
            }
            None => None,
        }
    }

    pub fn insert_completed(&mut self, id: BlockId, state: BftState) {
        self.insert(id, RoundEntry::Completed(state));
    }

    pub fn insert_in_progress(&mut self, id: BlockId, justifier: Justifier) {
        self.insert(id, RoundEntry::InProgress(justifier));
    }

    fn insert(&mut self, id: BlockId, entry: RoundEntry) {
        let priority = id.number();
        if self.entries.insert(id, entry).is_none() {
            self.order.insert((priority, id));
        }
        while self.entries.len() > self.capacity {
            let Some(lowest) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&lowest.1);
        }
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn is_in_progress(&self, id: &BlockId) -> bool {
        matches!(self.entries.get(id), Some(RoundEntry::InProgress(_)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            hits: self.hits,
            misses: self.misses,
        }
    }
}
