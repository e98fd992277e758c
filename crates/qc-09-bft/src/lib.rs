//! # qc-09-bft
//!
//! BFT finality engine for a Proof-of-Authority chain.
//!
//! ## Overview
//!
//! Proposers set a single commit bit ("COM") in the headers they sign. The
//! engine tallies those votes per checkpoint round and per branch:
//!
//! - **Justified**: a round where at least `ceil(2/3)` of the authorities
//!   committed.
//! - **Quality**: consecutive justified rounds ending at a checkpoint,
//!   persisted once per checkpoint.
//! - **Finalized**: two consecutive justified rounds finalize the earlier
//!   round's checkpoint. It never moves backward.
//!
//! ## Architecture
//!
//! ```text
//!                   ┌─────────────────────── Engine ───────────────────────┐
//! commit_block ───→ │ RoundStateCache ──→ Justifier ──→ QualityStore (LRU) │ ──→ KeyValueStore
//! should_vote  ───→ │ Casts ledger (packer only)                           │
//!                   └──────────────┬───────────────────────────────────────┘
//!                                  │ ArcSwap<FinalitySnapshot>
//!                                  ↓
//!                  FinalityHandle: finalized() / justified()  (any thread)
//! ```
//!
//! The chain is read through [`ports::ChainRepository`]; records live under
//! the `bft.engine/` namespace of the node's [`ports::KeyValueStore`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use qc_09_bft::{Engine, FinalityConfig, Committer};
//! use qc_09_bft::adapters::InMemoryKVStore;
//!
//! let mut engine = Engine::new(repo, InMemoryKVStore::new(), FinalityConfig::from_env(), master)?;
//! let reader = engine.handle();
//!
//! engine.commit_block(&header, false)?;
//! let com = engine.should_vote(&header.id)?;
//!
//! let finalized = reader.finalized()?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod snapshot;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::FinalityConfig;
pub use domain::{BftState, Cast, Casts, Justifier, RoundSchedule};
pub use engine::Engine;
pub use error::{FinalityError, FinalityResult, KVStoreError};
pub use ports::{BatchOperation, ChainRepository, Committer, KeyValueStore};
pub use snapshot::{FinalityHandle, FinalitySnapshot};
