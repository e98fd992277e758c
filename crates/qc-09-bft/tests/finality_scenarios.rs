//! # Finality Scenarios (qc-09-bft)
//!
//! End-to-end behaviour of `commit_block` over an in-memory chain with a
//! checkpoint interval of 5.
//!
//! ## Test Categories
//!
//! 1. **Quorum** - 2/3 thresholds for 3 and 7 authorities
//! 2. **Finalization** - two consecutive justified rounds, streak breaks
//! 3. **Determinism** - cold vs warm state, restart
//! 4. **Safety** - monotone finality, inconsistent branches, search failures

mod common;

use common::*;
use qc_09_bft::adapters::InMemoryKVStore;
use qc_09_bft::test_utils::MemoryChain;
use qc_09_bft::{BftState, ChainRepository, Committer, Engine, FinalityConfig, FinalityError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

// =============================================================================
// QUORUM
// =============================================================================

#[test]
fn test_round_with_full_participation_is_justified() {
    let (chain, mut engine) = setup(3);
    let round1 = chain.extend_round_robin(&chain.genesis_id(), 5, |_| true);
    commit_all(&mut engine, &round1);

    let st = engine.compute_state(&round1[4]).unwrap();
    assert_eq!(
        st,
        BftState {
            quality: 1,
            justified: true
        }
    );
    assert_eq!(engine.quality_of(&round1[4].id).unwrap(), 1);
    assert_eq!(engine.justified(), round1[4].id);
    assert_eq!(engine.finalized(), chain.genesis_id());
}

#[test]
fn test_seven_authorities_need_five_commit_votes() {
    init_tracing();
    let config = FinalityConfig::default().with_interval(10);

    // signers 0..=3 commit: 4 of 7
    let chain = Arc::new(MemoryChain::new(7));
    let mut engine =
        Engine::new(chain.clone(), InMemoryKVStore::new(), config.clone(), chain.authority(0))
            .unwrap();
    let round = chain.extend_round_robin(&chain.genesis_id(), 10, |n| (n - 1) % 7 < 4);
    commit_all(&mut engine, &round);
    assert!(!engine.compute_state(&round[9]).unwrap().justified);
    assert_eq!(engine.quality_of(&round[9].id).unwrap(), 0);

    // signers 0..=4 commit: 5 of 7
    let chain = Arc::new(MemoryChain::new(7));
    let mut engine =
        Engine::new(chain.clone(), InMemoryKVStore::new(), config, chain.authority(0)).unwrap();
    let round = chain.extend_round_robin(&chain.genesis_id(), 10, |n| (n - 1) % 7 < 5);
    commit_all(&mut engine, &round);
    assert!(engine.compute_state(&round[9]).unwrap().justified);
    assert_eq!(engine.justified(), round[9].id);
}

#[test]
fn test_repeated_signer_counts_once() {
    let (chain, mut engine) = setup(3);
    // A commits twice, B and C never do
    let round = chain.extend_with(
        &chain.genesis_id(),
        &[(0, true), (1, false), (0, true), (2, false), (0, true)],
    );
    commit_all(&mut engine, &round);
    assert_eq!(engine.compute_state(&round[4]).unwrap(), BftState::default());
}

#[test]
fn test_authority_set_read_from_opening_checkpoint() {
    let (chain, mut engine) = setup(3);
    let round1 = chain.extend_round_robin(&chain.genesis_id(), 5, |_| true);
    commit_all(&mut engine, &round1);

    // round 2 sees the set recorded at block 5 (3 authorities), even though
    // blocks inside the round claim a larger one
    chain.set_max_proposers(9);
    let round2 = chain.extend_round_robin(&round1[4].id, 5, |n| n == 6 || n == 7);
    commit_all(&mut engine, &round2);
    assert!(engine.compute_state(&round2[4]).unwrap().justified);

    // round 3 uses 9 from block 10: two votes are far from enough
    let round3 = chain.extend_round_robin(&round2[4].id, 5, |_| true);
    commit_all(&mut engine, &round3);
    assert_eq!(engine.quality_of(&round3[4].id).unwrap(), 0);
}

// =============================================================================
// FINALIZATION
// =============================================================================

#[test]
fn test_two_justified_rounds_finalize_first_checkpoint() {
    let (chain, mut engine) = setup(3);
    let reader = engine.handle();
    let round1 = chain.extend_round_robin(&chain.genesis_id(), 5, |_| true);
    commit_all(&mut engine, &round1);
    assert_eq!(reader.finalized().unwrap(), chain.genesis_id());

    let round2 = chain.extend_round_robin(&round1[4].id, 5, |_| true);
    for header in &round2[..4] {
        engine.commit_block(header, false).unwrap();
        // never earlier than the closing block of round 2
        assert_eq!(reader.finalized().unwrap(), chain.genesis_id());
    }

    engine.commit_block(&round2[4], false).unwrap();
    assert_eq!(reader.finalized().unwrap(), round1[4].id);
    assert_eq!(reader.justified().unwrap(), round2[4].id);
    assert_eq!(engine.quality_of(&round2[4].id).unwrap(), 2);
}

#[test]
fn test_missing_quorum_resets_streak() {
    let (chain, mut engine) = setup(3);
    let round1 = chain.extend_round_robin(&chain.genesis_id(), 5, |_| true);
    commit_all(&mut engine, &round1);

    // only authority A (blocks 7 and 10) commits in round 2
    let round2 = chain.extend_round_robin(&round1[4].id, 5, |n| (n - 1) % 3 == 0);
    commit_all(&mut engine, &round2);

    assert_eq!(engine.quality_of(&round2[4].id).unwrap(), 0);
    assert_eq!(engine.finalized(), chain.genesis_id());
    assert_eq!(engine.justified(), round1[4].id);

    // a fresh streak needs two more justified rounds
    let round3 = chain.extend_round_robin(&round2[4].id, 5, |_| true);
    commit_all(&mut engine, &round3);
    assert_eq!(engine.quality_of(&round3[4].id).unwrap(), 1);
    assert_eq!(engine.finalized(), chain.genesis_id());

    let round4 = chain.extend_round_robin(&round3[4].id, 5, |_| true);
    commit_all(&mut engine, &round4);
    assert_eq!(engine.quality_of(&round4[4].id).unwrap(), 2);
    assert_eq!(engine.finalized(), round3[4].id);
}

#[test]
fn test_long_streak_keeps_advancing() {
    let (chain, mut engine) = setup(3);
    let blocks = chain.extend_round_robin(&chain.genesis_id(), 25, |_| true);
    commit_all(&mut engine, &blocks);

    assert_eq!(engine.quality_of(&blocks[24].id).unwrap(), 5);
    assert_eq!(engine.finalized(), blocks[19].id);
}

#[test]
fn test_blocks_below_activation_have_zero_state() {
    init_tracing();
    let chain = Arc::new(MemoryChain::new(3));
    let config = FinalityConfig::default()
        .with_interval(INTERVAL)
        .with_finality_fork(12);
    let mut engine =
        Engine::new(chain.clone(), InMemoryKVStore::new(), config, chain.authority(0)).unwrap();

    let blocks = chain.extend_round_robin(&chain.genesis_id(), 20, |_| true);
    for header in &blocks[..11] {
        engine.commit_block(header, false).unwrap();
        assert_eq!(engine.compute_state(header).unwrap(), BftState::default());
        assert_eq!(engine.justified(), chain.genesis_id());
    }

    // activation round 11..=15 only counts blocks 12..=15
    commit_all(&mut engine, &blocks[11..]);
    assert_eq!(engine.quality_of(&blocks[14].id).unwrap(), 1);
    assert_eq!(engine.quality_of(&blocks[19].id).unwrap(), 2);
    assert_eq!(engine.finalized(), blocks[14].id);
    assert_eq!(Committer::justified(&engine).unwrap(), blocks[19].id);
}

#[test]
fn test_justified_follows_latest_justified_round_across_forks() {
    let (chain, mut engine) = setup(3);
    let round1 = chain.extend_round_robin(&chain.genesis_id(), 5, |_| true);
    commit_all(&mut engine, &round1);

    // left: round 2 misses quorum, round 3 is justified at #15
    let left = chain.extend_round_robin(&round1[4].id, 10, |n| n > 10);
    commit_all(&mut engine, &left);
    assert_eq!(engine.quality_of(&left[4].id).unwrap(), 0);
    assert_eq!(engine.justified(), left[9].id);
    assert_eq!(engine.finalized(), chain.genesis_id());

    // right: round 2 is justified at a lower checkpoint and finalizes #5
    let right = chain.extend_round_robin(&round1[4].id, 5, |_| true);
    commit_all(&mut engine, &right);
    assert_eq!(engine.quality_of(&right[4].id).unwrap(), 2);
    assert_eq!(engine.finalized(), round1[4].id);
    assert_eq!(engine.justified(), right[4].id);
}

// =============================================================================
// DETERMINISM
// =============================================================================

#[test]
fn test_cold_and_warm_state_agree() {
    let (chain, mut engine) = setup(4);
    let mut rng = StdRng::seed_from_u64(7);
    let votes: Vec<bool> = (0..23).map(|_| rng.gen_bool(0.7)).collect();
    let blocks = chain.extend_round_robin(&chain.genesis_id(), 23, |n| votes[n as usize - 1]);
    commit_all(&mut engine, &blocks);

    let warm: Vec<BftState> = blocks
        .iter()
        .map(|h| engine.compute_state(h).unwrap())
        .collect();
    let again: Vec<BftState> = blocks
        .iter()
        .map(|h| engine.compute_state(h).unwrap())
        .collect();
    assert_eq!(warm, again);

    // fresh caches, newest block first
    let mut cold = restart(&chain, engine);
    for (header, expected) in blocks.iter().zip(&warm).rev() {
        assert_eq!(cold.compute_state(header).unwrap(), *expected);
    }
}

#[test]
fn test_justified_restored_after_restart() {
    let (chain, mut engine) = setup(3);
    let blocks = chain.extend_round_robin(&chain.genesis_id(), 20, |n| n <= 10);
    // #15 closes an unjustified round, #20 is not committed yet
    commit_all(&mut engine, &blocks[..17]);
    assert_eq!(engine.quality_of(&blocks[14].id).unwrap(), 0);
    assert_eq!(engine.justified(), blocks[9].id);
    assert_eq!(engine.finalized(), blocks[4].id);

    let engine = restart(&chain, engine);
    assert_eq!(chain.best_header().unwrap().id, blocks[19].id);
    assert_eq!(engine.justified(), blocks[9].id);
    assert_eq!(engine.handle().justified().unwrap(), blocks[9].id);
}

#[test]
fn test_fresh_engine_reports_finalized_as_justified() {
    let (chain, engine) = setup(3);
    chain.extend_round_robin(&chain.genesis_id(), 7, |_| true);

    // nothing committed: no quality records to restore from
    let engine = restart(&chain, engine);
    assert_eq!(engine.justified(), chain.genesis_id());
}

#[test]
fn test_finalized_survives_restart() {
    let (chain, mut engine) = setup(3);
    let blocks = chain.extend_round_robin(&chain.genesis_id(), 10, |_| true);
    commit_all(&mut engine, &blocks);
    assert_eq!(engine.finalized(), blocks[4].id);

    let mut engine = restart(&chain, engine);
    assert_eq!(engine.finalized(), blocks[4].id);
    assert_eq!(engine.quality_of(&blocks[9].id).unwrap(), 2);

    // recommitting the same checkpoint is a no-op
    engine.commit_block(&blocks[9], false).unwrap();
    assert_eq!(engine.finalized(), blocks[4].id);
}

// =============================================================================
// SAFETY
// =============================================================================

#[test]
fn test_finalized_never_moves_backward() {
    let (chain, mut engine) = setup(3);
    let mut rng = StdRng::seed_from_u64(0x0b_f7);
    let mut tips = vec![chain.genesis_id()];
    let mut last = 0u32;

    for _ in 0..400 {
        let parent = tips[rng.gen_range(0..tips.len())];
        if !engine.accepts(&parent).unwrap() {
            tips.retain(|id| *id != parent);
            continue;
        }
        let header = chain.append(&parent, rng.gen_range(0..3), rng.gen_bool(0.85));
        engine.commit_block(&header, false).unwrap();

        let finalized = engine.finalized().number();
        assert!(finalized >= last, "finalized moved back {} -> {}", last, finalized);
        last = finalized;

        // mostly extend, sometimes fork
        if rng.gen_bool(0.9) {
            tips.retain(|id| *id != parent);
        }
        tips.push(header.id);
        if tips.len() > 6 {
            tips.remove(0);
        }
    }
    assert!(last > 0, "random run never finalized");
}

#[test]
fn test_commit_off_finalized_branch_is_fatal() {
    let (chain, mut engine) = setup(3);
    let trunk = chain.extend_round_robin(&chain.genesis_id(), 10, |_| true);
    let fork = chain.extend_round_robin(&trunk[2].id, 4, |_| true);
    commit_all(&mut engine, &trunk);
    assert_eq!(engine.finalized(), trunk[4].id);

    // above finalized but built on a superseded branch
    let err = engine.commit_block(&fork[3], false).unwrap_err();
    assert!(matches!(err, FinalityError::InconsistentBranch { .. }));
    assert!(err.is_fatal());

    // at or below finalized on a different branch
    let err = engine.commit_block(&fork[0], false).unwrap_err();
    assert!(matches!(err, FinalityError::InconsistentBranch { .. }));

    // replaying the finalized branch is fine
    engine.commit_block(&trunk[1], false).unwrap();
    assert_eq!(engine.finalized(), trunk[4].id);
}

#[test]
fn test_find_checkpoint_by_quality() {
    let (chain, mut engine) = setup(3);
    let blocks = chain.extend_round_robin(&chain.genesis_id(), 15, |_| true);
    commit_all(&mut engine, &blocks);
    let head = blocks[14].id;

    assert_eq!(engine.find_checkpoint_by_quality(1, 0, &head).unwrap(), blocks[4].id);
    assert_eq!(engine.find_checkpoint_by_quality(3, 0, &head).unwrap(), blocks[14].id);
    assert_eq!(engine.find_checkpoint_by_quality(2, 10, &head).unwrap(), blocks[9].id);

    let err = engine.find_checkpoint_by_quality(4, 0, &head).unwrap_err();
    assert!(matches!(
        err,
        FinalityError::SearchExhausted {
            target: 4,
            start: 0,
            end: 15
        }
    ));
    // quality 1 lies below the searched range
    assert!(matches!(
        engine.find_checkpoint_by_quality(1, 10, &head),
        Err(FinalityError::SearchExhausted { .. })
    ));
}

#[test]
fn test_unknown_parent_is_reported() {
    let (chain, mut engine) = setup(3);
    let blocks = chain.extend_round_robin(&chain.genesis_id(), 3, |_| true);
    commit_all(&mut engine, &blocks);

    let missing = shared_types::BlockId::new(7, [0xEE; 32]);
    assert!(chain.get_header(&missing).unwrap().is_none());
    assert!(matches!(
        engine.should_vote(&missing),
        Err(FinalityError::BlockNotFound { id }) if id == missing
    ));
}
