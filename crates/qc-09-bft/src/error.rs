//! Error types for the BFT finality engine

use shared_types::BlockId;
use thiserror::Error;

/// Finality engine errors
#[derive(Debug, Error)]
pub enum FinalityError {
    /// Block is unknown to the chain repository
    #[error("Block not found: {id}")]
    BlockNotFound { id: BlockId },

    /// Branch ending at `head` has no block at `number`
    #[error("No block #{number} on branch {head}")]
    AncestorNotFound { head: BlockId, number: u32 },

    /// A finality-affecting block does not descend from the finalized checkpoint
    #[error("Inconsistent branch: block {block} does not descend from finalized checkpoint {finalized}")]
    InconsistentBranch { block: BlockId, finalized: BlockId },

    /// No checkpoint in the searched range reaches the target quality
    #[error("Search exhausted: no checkpoint with quality {target} in blocks #{start}..=#{end}")]
    SearchExhausted { target: u32, start: u32, end: u32 },

    /// A persisted quality would be overwritten with a different value
    #[error("Quality conflict at checkpoint {checkpoint}: stored {stored}, computed {computed}")]
    QualityConflict {
        checkpoint: BlockId,
        stored: u32,
        computed: u32,
    },

    /// Underlying key/value store failure
    #[error("Storage error: {reason}")]
    Storage { reason: String },

    /// Persisted record could not be decoded
    #[error("Corrupted record {key}: {reason}")]
    Corrupted { key: String, reason: String },

    /// Engine configuration rejected
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl FinalityError {
    /// Whether the error signals a safety violation that must halt the branch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InconsistentBranch { .. } | Self::QualityConflict { .. }
        )
    }
}

/// Result type for finality operations
pub type FinalityResult<T> = Result<T, FinalityError>;

/// Key/value store adapter errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write
    #[error("KV store I/O error: {message}")]
    IOError { message: String },
    /// Data corruption in the store
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
}

impl From<KVStoreError> for FinalityError {
    fn from(err: KVStoreError) -> Self {
        FinalityError::Storage {
            reason: err.to_string(),
        }
    }
}
