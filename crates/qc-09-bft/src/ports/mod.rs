//! Ports (Hexagonal Architecture)

pub mod inbound;
pub mod outbound;

pub use inbound::Committer;
pub use outbound::{BatchOperation, ChainRepository, KeyValueStore};
