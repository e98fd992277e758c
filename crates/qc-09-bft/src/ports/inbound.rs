//! Driving Ports (API - Inbound)
//!
//! Read side of finality exposed to the rest of the node. The write side
//! (commit, vote, fork choice) lives on [`crate::Engine`] because it needs
//! exclusive access.

use crate::error::FinalityResult;
use shared_types::BlockId;

/// Finality checkpoints as seen by consumers.
///
/// Safe to call from any thread while the engine commits blocks.
pub trait Committer: Send + Sync {
    /// Latest finalized checkpoint (genesis before any finality)
    fn finalized(&self) -> FinalityResult<BlockId>;

    /// Latest justified checkpoint.
    ///
    /// Falls back to the finalized checkpoint until a round is justified.
    fn justified(&self) -> FinalityResult<BlockId>;
}
