//! # Justifier (Round Vote Tally)
//!
//! Accumulates the commit votes observed along one branch within one round
//! and summarizes them into a [`BftState`].
//!
//! ## Rules
//!
//! - Each signer counts once per round; the first observation stands.
//! - Justified iff distinct committing signers reach `ceil(2 * max / 3)`.
//! - A closed round yields `prior + 1` when justified, `0` otherwise.

use crate::domain::round::quorum_threshold;
use shared_types::Address;
use std::collections::HashMap;

/// Finality state of a block with respect to its round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BftState {
    /// Count of consecutive justified rounds ending here
    pub quality: u32,
    /// Whether the round reached the commit quorum
    pub justified: bool,
}

/// Per-round, per-branch commit vote accumulator.
#[derive(Clone, Debug)]
pub struct Justifier {
    /// Checkpoint number that closes the round being tallied
    closing: u32,
    /// Quality of the opening checkpoint
    prior_quality: u32,
    /// Authority-set size for this round
    max_proposers: u64,
    /// Signer -> first observed commit bit
    votes: HashMap<Address, bool>,
    /// Distinct committing signers
    com_votes: u64,
}

impl Justifier {
    pub fn new(closing: u32, prior_quality: u32, max_proposers: u64) -> Self {
        Self {
            closing,
            prior_quality,
            max_proposers,
            votes: HashMap::new(),
            com_votes: 0,
        }
    }

    /// Record that `signer` produced a block in this round.
    ///
    /// Later observations of the same signer are ignored.
    pub fn add_block(&mut self, signer: Address, committed: bool) {
        if let std::collections::hash_map::Entry::Vacant(entry) = self.votes.entry(signer) {
            entry.insert(committed);
            if committed {
                self.com_votes += 1;
            }
        }
    }

    /// Summarize a closed round.
    pub fn summarize(&self) -> BftState {
        if self.reaches_quorum() {
            BftState {
                quality: self.prior_quality.saturating_add(1),
                justified: true,
            }
        } else {
            BftState {
                quality: 0,
                justified: false,
            }
        }
    }

    /// Summarize a round that is still open.
    ///
    /// Without quorum yet, the streak of the previous round is carried.
    pub fn preview(&self) -> BftState {
        if self.reaches_quorum() {
            BftState {
                quality: self.prior_quality.saturating_add(1),
                justified: true,
            }
        } else {
            BftState {
                quality: self.prior_quality,
                justified: false,
            }
        }
    }

    /// State of the block numbered `number` whose votes are all recorded.
    pub fn state_at(&self, number: u32) -> BftState {
        if number == self.closing {
            self.summarize()
        } else {
            self.preview()
        }
    }

    fn reaches_quorum(&self) -> bool {
        let threshold = quorum_threshold(self.max_proposers);
        threshold > 0 && self.com_votes >= threshold
    }

    /// Distinct signers observed so far.
    pub fn signers(&self) -> usize {
        self.votes.len()
    }

    /// Distinct committing signers observed so far.
    pub fn com_votes(&self) -> u64 {
        self.com_votes
    }
}
