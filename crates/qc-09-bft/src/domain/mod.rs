//! Domain layer: pure finality rules with no I/O.

pub mod casts;
pub mod justifier;
pub mod round;
pub mod state_cache;

pub use casts::{Cast, Casts};
pub use justifier::{BftState, Justifier};
pub use round::{quorum_threshold, RoundSchedule};
pub use state_cache::{CacheStats, RoundEntry, RoundStateCache};
