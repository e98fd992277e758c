//! Round and checkpoint arithmetic
//!
//! Round `k` covers blocks `(k-1)*I+1 ..= k*I` and is closed by its
//! checkpoint `k*I`. Genesis alone forms round 0.

/// Quorum of commit votes needed to justify a round: `ceil(2 * max / 3)`.
pub fn quorum_threshold(max_proposers: u64) -> u64 {
    (max_proposers.saturating_mul(2) + 2) / 3
}

/// Checkpoint layout of the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundSchedule {
    interval: u32,
    finality_fork: u32,
}

impl RoundSchedule {
    pub fn new(interval: u32, finality_fork: u32) -> Self {
        debug_assert!(interval >= 2);
        Self {
            interval,
            finality_fork,
        }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Most recent checkpoint at or below `number`.
    pub fn get_checkpoint(&self, number: u32) -> u32 {
        number / self.interval * self.interval
    }

    pub fn is_checkpoint(&self, number: u32) -> bool {
        number % self.interval == 0
    }

    /// Round that block `number` belongs to.
    pub fn round_of(&self, number: u32) -> u32 {
        number.div_ceil(self.interval)
    }

    /// Checkpoint that opens the round of `number` (the previous round's close).
    ///
    /// For a checkpoint this is the checkpoint one interval below it.
    pub fn opening_checkpoint(&self, number: u32) -> u32 {
        self.get_checkpoint(number.saturating_sub(1))
    }

    /// Checkpoint that closes the round of `number`.
    pub fn closing_checkpoint(&self, number: u32) -> u32 {
        self.round_of(number).saturating_mul(self.interval)
    }

    /// Whether finality is active at `number`.
    pub fn is_active(&self, number: u32) -> bool {
        number > 0 && number >= self.finality_fork
    }

    /// First round containing an active block.
    pub fn activation_round(&self) -> u32 {
        self.round_of(self.finality_fork.max(1))
    }

    /// Round of `number` relative to the activation round.
    ///
    /// Blocks before activation report 0.
    pub fn abs_round(&self, number: u32) -> u32 {
        self.round_of(number).saturating_sub(self.activation_round())
    }

    /// First checkpoint position a quality search may start from.
    pub fn activation_checkpoint(&self) -> u32 {
        self.get_checkpoint(self.finality_fork)
    }
}
