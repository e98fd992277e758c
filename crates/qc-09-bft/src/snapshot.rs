//! Lock-free read view of the finality checkpoints.
//!
//! The engine publishes a fresh [`FinalitySnapshot`] after every commit that
//! moves a checkpoint. Readers load it through a cloned [`FinalityHandle`]
//! without ever blocking the committer.

use crate::error::FinalityResult;
use crate::ports::inbound::Committer;
use arc_swap::ArcSwap;
use shared_types::BlockId;
use std::sync::Arc;

/// Checkpoints at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinalitySnapshot {
    pub finalized: BlockId,
    pub justified: Option<BlockId>,
}

impl FinalitySnapshot {
    pub fn new(finalized: BlockId) -> Self {
        Self {
            finalized,
            justified: None,
        }
    }

    /// Justified checkpoint, or the finalized one before any justification.
    pub fn justified_or_finalized(&self) -> BlockId {
        self.justified.unwrap_or(self.finalized)
    }
}

/// Shared reader of the engine's checkpoints.
#[derive(Clone, Debug)]
pub struct FinalityHandle {
    current: Arc<ArcSwap<FinalitySnapshot>>,
}

impl FinalityHandle {
    pub(crate) fn new(initial: FinalitySnapshot) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn snapshot(&self) -> FinalitySnapshot {
        **self.current.load()
    }

    pub(crate) fn publish(&self, next: FinalitySnapshot) {
        self.current.store(Arc::new(next));
    }
}

impl Committer for FinalityHandle {
    fn finalized(&self) -> FinalityResult<BlockId> {
        Ok(self.current.load().finalized)
    }

    fn justified(&self) -> FinalityResult<BlockId> {
        Ok(self.current.load().justified_or_finalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_observe_published_snapshot() {
        let genesis = BlockId::new(0, [0; 32]);
        let handle = FinalityHandle::new(FinalitySnapshot::new(genesis));
        let reader = handle.clone();

        assert_eq!(reader.justified().unwrap(), genesis);

        let cp = BlockId::new(10, [7; 32]);
        handle.publish(FinalitySnapshot {
            finalized: genesis,
            justified: Some(cp),
        });
        assert_eq!(reader.finalized().unwrap(), genesis);
        assert_eq!(reader.justified().unwrap(), cp);
    }
}
