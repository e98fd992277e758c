//! # Casts Ledger
//!
//! The proposer's own commit votes: checkpoint -> quality at the time of the
//! vote. Consulted only by the packer path before setting the COM bit.
//!
//! Entries at or below the finalized checkpoint are settled and pruned.

use shared_types::BlockId;
use std::collections::HashMap;

/// A commit vote this node previously cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cast {
    pub checkpoint: BlockId,
    pub quality: u32,
}

/// Checkpoint -> quality map of this node's casts.
#[derive(Clone, Debug, Default)]
pub struct Casts {
    entries: HashMap<BlockId, u32>,
}

impl Casts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cast, keeping the highest quality seen for the checkpoint.
    pub fn mark(&mut self, checkpoint: BlockId, quality: u32) {
        let entry = self.entries.entry(checkpoint).or_insert(quality);
        if quality > *entry {
            *entry = quality;
        }
    }

    /// Casts above `finalized`, newest checkpoint first.
    pub fn slice(&self, finalized: &BlockId) -> Vec<Cast> {
        let floor = finalized.number();
        let mut list: Vec<Cast> = self
            .entries
            .iter()
            .filter(|(checkpoint, _)| checkpoint.number() > floor)
            .map(|(checkpoint, quality)| Cast {
                checkpoint: *checkpoint,
                quality: *quality,
            })
            .collect();
        list.sort_by(|a, b| b.checkpoint.cmp(&a.checkpoint));
        list
    }

    /// Drop casts at or below `finalized`. Returns how many were removed.
    pub fn prune(&mut self, finalized: &BlockId) -> usize {
        let floor = finalized.number();
        let before = self.entries.len();
        self.entries.retain(|checkpoint, _| checkpoint.number() > floor);
        before - self.entries.len()
    }

    pub fn get(&self, checkpoint: &BlockId) -> Option<u32> {
        self.entries.get(checkpoint).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
