//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use qc_09_bft::adapters::InMemoryKVStore;
use qc_09_bft::test_utils::MemoryChain;
use qc_09_bft::{Engine, FinalityConfig};
use shared_types::BlockHeader;
use std::sync::Arc;

pub type TestEngine = Engine<MemoryChain, InMemoryKVStore>;

/// Checkpoint interval used throughout the scenarios.
pub const INTERVAL: u32 = 5;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config() -> FinalityConfig {
    FinalityConfig::default().with_interval(INTERVAL)
}

/// Chain with `authorities` signers and an engine whose master is authority 0.
pub fn setup(authorities: usize) -> (Arc<MemoryChain>, TestEngine) {
    init_tracing();
    let chain = Arc::new(MemoryChain::new(authorities));
    let engine = Engine::new(
        chain.clone(),
        InMemoryKVStore::new(),
        config(),
        chain.authority(0),
    )
    .unwrap();
    (chain, engine)
}

/// Reopen the engine over the store of `engine`, as after a node restart.
pub fn restart(chain: &Arc<MemoryChain>, engine: TestEngine) -> TestEngine {
    let store = engine.into_store();
    Engine::new(chain.clone(), store, config(), chain.authority(0)).unwrap()
}

pub fn commit_all(engine: &mut TestEngine, blocks: &[BlockHeader]) {
    for header in blocks {
        engine.commit_block(header, false).unwrap();
    }
}
