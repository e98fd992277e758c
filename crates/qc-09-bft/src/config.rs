//! # Finality Configuration
//!
//! Fork and cache parameters for the BFT engine, with environment overrides:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `QC_BFT_CHECKPOINT_INTERVAL` | `checkpoint_interval` |
//! | `QC_BFT_FINALITY_FORK` | `finality_fork` |

use crate::error::{FinalityError, FinalityResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable overriding the checkpoint interval.
pub const ENV_CHECKPOINT_INTERVAL: &str = "QC_BFT_CHECKPOINT_INTERVAL";
/// Environment variable overriding the finality activation block.
pub const ENV_FINALITY_FORK: &str = "QC_BFT_FINALITY_FORK";

/// Finality engine configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalityConfig {
    /// Blocks per round (checkpoint interval)
    pub checkpoint_interval: u32,
    /// Block number at which finality activates
    pub finality_fork: u32,
    /// Capacity of the round-state cache
    pub state_cache_size: usize,
    /// Capacity of the quality LRU in front of the store
    pub quality_cache_size: usize,
    /// Maximum blocks walked when rebuilding the casts ledger
    pub max_casts_rebuild_depth: u32,
}

impl Default for FinalityConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 180,
            finality_fork: 0,
            state_cache_size: 256,
            quality_cache_size: 16,
            max_casts_rebuild_depth: 10_000,
        }
    }
}

impl FinalityConfig {
    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable values are logged and ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_CHECKPOINT_INTERVAL) {
            match raw.trim().parse() {
                Ok(v) => self.checkpoint_interval = v,
                Err(_) => warn!("[qc-09] ignoring {}={:?}", ENV_CHECKPOINT_INTERVAL, raw),
            }
        }
        if let Some(raw) = lookup(ENV_FINALITY_FORK) {
            match raw.trim().parse() {
                Ok(v) => self.finality_fork = v,
                Err(_) => warn!("[qc-09] ignoring {}={:?}", ENV_FINALITY_FORK, raw),
            }
        }
        self
    }

    /// Builder-style interval override.
    pub fn with_interval(mut self, checkpoint_interval: u32) -> Self {
        self.checkpoint_interval = checkpoint_interval;
        self
    }

    /// Builder-style activation override.
    pub fn with_finality_fork(mut self, finality_fork: u32) -> Self {
        self.finality_fork = finality_fork;
        self
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> FinalityResult<()> {
        if self.checkpoint_interval < 2 {
            return Err(FinalityError::InvalidConfig {
                reason: format!(
                    "checkpoint_interval must be at least 2, got {}",
                    self.checkpoint_interval
                ),
            });
        }
        if self.state_cache_size == 0 || self.quality_cache_size == 0 {
            return Err(FinalityError::InvalidConfig {
                reason: "cache sizes must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
