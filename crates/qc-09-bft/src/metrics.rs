//! # Finality Metrics
//!
//! Prometheus metrics for the BFT engine.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! qc-09-bft = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `bft_blocks_committed_total` - Counter of blocks passed to commit
//! - `bft_checkpoints_justified_total` - Counter of justified checkpoints
//! - `bft_checkpoints_finalized_total` - Counter of finalized checkpoints
//! - `bft_votes_total` - Counter of vote decisions (by outcome)
//! - `bft_finalized_number` - Gauge of the finalized block number
//! - `bft_checkpoint_quality` - Gauge of the last committed checkpoint quality

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_gauge, register_int_counter, register_int_counter_vec, Gauge, IntCounter,
    IntCounterVec,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total blocks committed
    pub static ref BLOCKS_COMMITTED: IntCounter = register_int_counter!(
        "bft_blocks_committed_total",
        "Total number of blocks passed to commit"
    )
    .expect("Failed to create BLOCKS_COMMITTED metric");

    /// Total checkpoints justified
    pub static ref CHECKPOINTS_JUSTIFIED: IntCounter = register_int_counter!(
        "bft_checkpoints_justified_total",
        "Total number of checkpoints justified"
    )
    .expect("Failed to create CHECKPOINTS_JUSTIFIED metric");

    /// Total checkpoints finalized
    pub static ref CHECKPOINTS_FINALIZED: IntCounter = register_int_counter!(
        "bft_checkpoints_finalized_total",
        "Total number of checkpoints finalized"
    )
    .expect("Failed to create CHECKPOINTS_FINALIZED metric");

    /// Vote decisions, labeled by outcome
    pub static ref VOTES: IntCounterVec = register_int_counter_vec!(
        "bft_votes_total",
        "Vote decisions taken by the packer",
        &["outcome"]
    )
    .expect("Failed to create VOTES metric");

    /// Finalized block number
    pub static ref FINALIZED_NUMBER: Gauge = register_gauge!(
        "bft_finalized_number",
        "Number of the latest finalized checkpoint"
    )
    .expect("Failed to create FINALIZED_NUMBER metric");

    /// Quality of the last committed checkpoint
    pub static ref CHECKPOINT_QUALITY: Gauge = register_gauge!(
        "bft_checkpoint_quality",
        "Quality of the last committed checkpoint"
    )
    .expect("Failed to create CHECKPOINT_QUALITY metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_block_committed() {
    BLOCKS_COMMITTED.inc();
}

/// Record a checkpoint summary
#[cfg(feature = "metrics")]
pub fn record_checkpoint(quality: u32, justified: bool) {
    CHECKPOINT_QUALITY.set(quality as f64);
    if justified {
        CHECKPOINTS_JUSTIFIED.inc();
    }
}

/// Record a checkpoint finalized
#[cfg(feature = "metrics")]
pub fn record_finalized(number: u32) {
    CHECKPOINTS_FINALIZED.inc();
    FINALIZED_NUMBER.set(number as f64);
}

/// Record a vote decision (`cast`, `no_quality`, `conflict`, ...)
#[cfg(feature = "metrics")]
pub fn record_vote(outcome: &str) {
    VOTES.with_label_values(&[outcome]).inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_block_committed() {}

#[cfg(not(feature = "metrics"))]
pub fn record_checkpoint(_quality: u32, _justified: bool) {}

#[cfg(not(feature = "metrics"))]
pub fn record_finalized(_number: u32) {}

#[cfg(not(feature = "metrics"))]
pub fn record_vote(_outcome: &str) {}
