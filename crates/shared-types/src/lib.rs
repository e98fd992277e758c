//! # Shared Types Crate
//!
//! Chain entities consumed by the BFT finality engine.
//!
//! ## Design Principles
//!
//! - **Self-describing identifiers**: a [`BlockId`] carries its block number
//!   in its first four bytes, so checkpoint arithmetic never needs a lookup.
//! - **Narrow headers**: [`BlockHeader`] only exposes what finality consumes
//!   (number, parent, signer, state root, COM bit).

pub mod entities;

pub use entities::*;
