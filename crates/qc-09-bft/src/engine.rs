//! # BFT Engine
//!
//! Tracks the commit votes embedded in block headers and derives the
//! justified and finalized checkpoints from them.
//!
//! ## Flow
//!
//! ```text
//! commit pipeline ──commit_block──→ Engine ──quality, finalized──→ KeyValueStore
//! packer ─────────should_vote────→   │
//! API / RPC ←─────FinalityHandle─────┘  (lock-free snapshot)
//! ```
//!
//! Not safe for concurrent mutation: every `&mut self` method must be driven
//! by a single writer. Readers go through [`FinalityHandle`].

use crate::adapters::NamespacedStore;
use crate::config::FinalityConfig;
use crate::domain::{BftState, Casts, Justifier, RoundSchedule, RoundStateCache};
use crate::error::{FinalityError, FinalityResult};
use crate::metrics;
use crate::ports::inbound::Committer;
use crate::ports::outbound::{ChainRepository, KeyValueStore};
use crate::snapshot::{FinalityHandle, FinalitySnapshot};
use crate::store::QualityStore;
use shared_types::{Address, BlockHeader, BlockId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Finality engine over a PoA chain.
pub struct Engine<R, S> {
    repo: Arc<R>,
    config: FinalityConfig,
    schedule: RoundSchedule,
    qualities: QualityStore<NamespacedStore<S>>,
    states: RoundStateCache,
    /// Loaded on first use by the packer
    casts: Option<Casts>,
    master: Address,
    handle: FinalityHandle,
}

impl<R, S> Engine<R, S>
where
    R: ChainRepository,
    S: KeyValueStore,
{
    /// Create an engine, restoring the finalized checkpoint from `store` and
    /// the justified one from the best chain.
    ///
    /// `master` is the address this node signs blocks with.
    pub fn new(
        repo: Arc<R>,
        store: S,
        config: FinalityConfig,
        master: Address,
    ) -> FinalityResult<Self> {
        config.validate()?;

        let mut qualities =
            QualityStore::new(NamespacedStore::engine(store), config.quality_cache_size);
        let schedule = RoundSchedule::new(config.checkpoint_interval, config.finality_fork);
        let finalized = match qualities.load_finalized()? {
            Some(id) => {
                info!("[qc-09] Restored finalized checkpoint {}", id);
                id
            }
            None => repo.genesis_id(),
        };

        let mut snapshot = FinalitySnapshot::new(finalized);
        snapshot.justified = restore_justified(&*repo, &mut qualities, schedule, &finalized)?;
        if let Some(id) = snapshot.justified {
            info!("[qc-09] Restored justified checkpoint {}", id);
        }

        Ok(Self {
            schedule,
            states: RoundStateCache::new(config.state_cache_size),
            handle: FinalityHandle::new(snapshot),
            casts: None,
            repo,
            config,
            qualities,
            master,
        })
    }

    /// Reader handle for the finalized/justified checkpoints.
    pub fn handle(&self) -> FinalityHandle {
        self.handle.clone()
    }

    pub fn finalized(&self) -> BlockId {
        self.handle.snapshot().finalized
    }

    pub fn justified(&self) -> BlockId {
        self.handle.snapshot().justified_or_finalized()
    }

    pub fn casts(&self) -> Option<&Casts> {
        self.casts.as_ref()
    }

    /// Whether a block built on `parent_id` stays on the finalized branch.
    pub fn accepts(&self, parent_id: &BlockId) -> FinalityResult<bool> {
        let finalized = self.finalized();
        if finalized.number() == 0 {
            return Ok(true);
        }
        self.repo.has_block(parent_id, &finalized)
    }

    /// Fork choice: whether `header` should replace the current best block.
    ///
    /// Higher quality wins, then the higher block, then the smaller id.
    pub fn select(&mut self, header: &BlockHeader) -> FinalityResult<bool> {
        let candidate = self.compute_state(header)?;
        let best = self.repo.best_header()?;
        let current = self.compute_state(&best)?;

        if candidate.quality != current.quality {
            return Ok(candidate.quality > current.quality);
        }
        if header.number != best.number {
            return Ok(header.number > best.number);
        }
        Ok(header.id < best.id)
    }

    /// Round state of `header`, memoized per block.
    ///
    /// A checkpoint gets its round summary; any other block gets the state
    /// of its round so far.
    pub fn compute_state(&mut self, header: &BlockHeader) -> FinalityResult<BftState> {
        if !self.schedule.is_active(header.number) {
            return Ok(BftState::default());
        }
        if let Some(state) = self.states.get_state(&header.id) {
            return Ok(state);
        }

        // the tally never crosses a checkpoint
        let reused = if self.schedule.is_checkpoint(header.number - 1) {
            None
        } else {
            self.states.take_justifier(&header.parent_id)
        };

        let justifier = match reused {
            Some(mut js) => {
                js.add_block(header.signer, header.com);
                js
            }
            None => self.new_justifier(header)?,
        };

        let state = justifier.state_at(header.number);
        if self.schedule.is_checkpoint(header.number) {
            self.states.insert_completed(header.id, state);
        } else {
            self.states.insert_in_progress(header.id, justifier);
        }
        Ok(state)
    }

    /// Rebuild the tally of `header`'s round by walking back to the opening
    /// checkpoint, then replaying the round oldest-first.
    fn new_justifier(&mut self, header: &BlockHeader) -> FinalityResult<Justifier> {
        let opening = self.schedule.opening_checkpoint(header.number);
        let closing = self.schedule.closing_checkpoint(header.number);
        debug!(
            "[qc-09] Rebuilding round #{}..=#{} from block #{}",
            opening + 1,
            closing,
            header.number
        );

        let mut votes = Vec::with_capacity((header.number - opening) as usize);
        let mut cursor = header.clone();
        while cursor.number > opening {
            if self.schedule.is_active(cursor.number) {
                votes.push((cursor.signer, cursor.com));
            }
            cursor = self.header(&cursor.parent_id)?;
        }

        let prior_quality =
            if self.schedule.round_of(header.number) == self.schedule.activation_round() {
                0
            } else {
                self.quality_of(&cursor.id)?
            };
        let max_proposers = self.repo.max_block_proposers(&cursor.state_root)?;

        let mut justifier = Justifier::new(closing, prior_quality, max_proposers);
        for (signer, committed) in votes.into_iter().rev() {
            justifier.add_block(signer, committed);
        }
        Ok(justifier)
    }

    /// Record an accepted block.
    ///
    /// At a checkpoint the round quality is persisted; two consecutive
    /// justified rounds finalize the earlier round's checkpoint.
    pub fn commit_block(&mut self, header: &BlockHeader, is_packing: bool) -> FinalityResult<()> {
        let current = self.handle.snapshot();
        self.ensure_on_finalized_branch(header, &current.finalized)?;
        metrics::record_block_committed();

        let mut next = current;
        if self.schedule.is_active(header.number) && self.schedule.is_checkpoint(header.number) {
            next = self.commit_checkpoint(header, current)?;
        }

        if next != current {
            self.handle.publish(next);
        }

        if is_packing {
            if let Some(casts) = self.casts.as_mut() {
                let pruned = casts.prune(&next.finalized);
                if pruned > 0 {
                    debug!("[qc-09] Pruned {} settled casts", pruned);
                }
            }
        }
        Ok(())
    }

    fn commit_checkpoint(
        &mut self,
        header: &BlockHeader,
        current: FinalitySnapshot,
    ) -> FinalityResult<FinalitySnapshot> {
        let state = self.compute_state(header)?;
        metrics::record_checkpoint(state.quality, state.justified);

        let mut next = current;
        let mut operations = Vec::with_capacity(2);
        if let Some(op) = self.qualities.stage(&header.id, state.quality)? {
            operations.push(op);
        }

        if state.justified {
            next.justified = Some(header.id);
        }

        if state.quality >= 2 {
            let target = header.number - self.schedule.interval();
            if target > current.finalized.number() {
                let id = self.block_id_on(&header.id, target)?;
                operations.push(self.qualities.stage_finalized(&id)?);
                next.finalized = id;
            }
        }

        self.qualities
            .commit(operations, &[(header.id, state.quality)])?;

        if next.justified != current.justified {
            info!(
                "[qc-09] ✅ Checkpoint #{} justified (quality {})",
                header.number, state.quality
            );
        }
        if next.finalized != current.finalized {
            info!(
                "[qc-09] 🔒 Checkpoint #{} finalized by #{} (quality {})",
                next.finalized.number(),
                header.number,
                state.quality
            );
            metrics::record_finalized(next.finalized.number());
        }
        Ok(next)
    }

    fn ensure_on_finalized_branch(
        &self,
        header: &BlockHeader,
        finalized: &BlockId,
    ) -> FinalityResult<()> {
        let consistent = if header.number > finalized.number() {
            self.repo.has_block(&header.parent_id, finalized)?
        } else {
            self.repo.has_block(finalized, &header.id)?
        };

        if !consistent {
            error!(
                "[qc-09] Block #{} {} is not on the branch of finalized checkpoint {}",
                header.number, header.id, finalized
            );
            return Err(FinalityError::InconsistentBranch {
                block: header.id,
                finalized: *finalized,
            });
        }
        Ok(())
    }

    /// Whether the block to be packed on `parent_id` should carry a commit
    /// vote. Records the cast when it does.
    pub fn should_vote(&mut self, parent_id: &BlockId) -> FinalityResult<bool> {
        if self.casts.is_none() {
            self.load_casts()?;
        }

        if self.schedule.abs_round(parent_id.number().saturating_add(1)) == 0 {
            metrics::record_vote("first_round");
            return Ok(false);
        }

        let parent = self.header(parent_id)?;
        let state = self.compute_state(&parent)?;
        if state.quality == 0 {
            metrics::record_vote("no_quality");
            return Ok(false);
        }

        let head_quality = state.quality;
        let finalized = self.finalized();
        let recent_jc = self.recent_justified_checkpoint(&parent, state, &finalized)?;

        let previous = self
            .casts
            .as_ref()
            .map(|casts| casts.slice(&finalized))
            .unwrap_or_default();
        for cast in previous {
            if cast.quality.saturating_add(1) < head_quality {
                continue;
            }
            let (higher, lower) = if cast.checkpoint.number() > recent_jc.number() {
                (cast.checkpoint, recent_jc)
            } else {
                (recent_jc, cast.checkpoint)
            };
            if !self.repo.has_block(&higher, &lower)? {
                warn!(
                    "[qc-09] Withholding commit vote: cast at {} (quality {}) conflicts with {} (quality {})",
                    cast.checkpoint, cast.quality, recent_jc, head_quality
                );
                metrics::record_vote("conflict");
                return Ok(false);
            }
        }

        self.casts
            .get_or_insert_with(Casts::new)
            .mark(recent_jc, head_quality);
        metrics::record_vote("cast");
        Ok(true)
    }

    /// Most recent checkpoint the branch of `parent` justifies.
    fn recent_justified_checkpoint(
        &mut self,
        parent: &BlockHeader,
        state: BftState,
        finalized: &BlockId,
    ) -> FinalityResult<BlockId> {
        let interval = self.schedule.interval();
        let checkpoint = self.schedule.get_checkpoint(parent.number);
        if state.justified {
            return self.block_id_on(&parent.id, checkpoint);
        }

        // Without quorum yet, `state.quality` is the streak ending at the
        // opening checkpoint; search only inside that streak.
        let head = self.block_id_on(&parent.id, checkpoint)?;
        let streak_start =
            checkpoint.saturating_sub(state.quality.saturating_sub(1).saturating_mul(interval));
        let boundary = streak_start.max(finalized.number());
        self.find_checkpoint_by_quality(state.quality, boundary, &head)
    }

    /// Earliest checkpoint with exactly `target` quality on the branch of
    /// `head`, searching upward from `start` (the activation checkpoint when
    /// `start` is 0).
    ///
    /// Qualities in the searched range must be non-decreasing.
    pub fn find_checkpoint_by_quality(
        &mut self,
        target: u32,
        start: u32,
        head: &BlockId,
    ) -> FinalityResult<BlockId> {
        let interval = self.schedule.interval();
        let start = if start == 0 {
            self.schedule.activation_checkpoint()
        } else {
            start
        };
        let end = head.number();
        let exhausted = FinalityError::SearchExhausted { target, start, end };
        if end < start {
            return Err(exhausted);
        }

        let n = (end - start) / interval + 1;
        let (mut lo, mut hi) = (0u32, n);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let id = self.block_id_on(head, start + mid * interval)?;
            if self.quality_of(&id)? >= target {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        if lo == n {
            return Err(exhausted);
        }

        let id = self.block_id_on(head, start + lo * interval)?;
        if self.quality_of(&id)? != target {
            return Err(exhausted);
        }
        Ok(id)
    }

    /// Rebuild the casts ledger from this node's own COM blocks on the best
    /// chain above the finalized checkpoint.
    pub fn load_casts(&mut self) -> FinalityResult<usize> {
        let finalized = self.finalized();
        let mut casts = Casts::new();
        let mut cursor = self.repo.best_header()?;
        let mut walked = 0u32;

        while cursor.number > finalized.number() && walked < self.config.max_casts_rebuild_depth {
            let parent = self.header(&cursor.parent_id)?;
            if cursor.com && cursor.signer == self.master {
                let state = self.compute_state(&parent)?;
                if state.quality > 0 {
                    match self.recent_justified_checkpoint(&parent, state, &finalized) {
                        Ok(checkpoint) => casts.mark(checkpoint, state.quality),
                        Err(FinalityError::SearchExhausted { .. }) => {
                            debug!("[qc-09] No justified checkpoint behind cast at #{}", cursor.number);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            cursor = parent;
            walked += 1;
        }

        let loaded = casts.len();
        debug!("[qc-09] Loaded {} casts after walking {} blocks", loaded, walked);
        self.casts = Some(casts);
        Ok(loaded)
    }

    /// Persisted quality of a checkpoint, 0 if never written.
    pub fn quality_of(&mut self, checkpoint: &BlockId) -> FinalityResult<u32> {
        Ok(self.qualities.get(checkpoint)?.unwrap_or(0))
    }

    fn header(&self, id: &BlockId) -> FinalityResult<BlockHeader> {
        self.repo
            .get_header(id)?
            .ok_or(FinalityError::BlockNotFound { id: *id })
    }

    fn block_id_on(&self, head: &BlockId, number: u32) -> FinalityResult<BlockId> {
        self.repo
            .get_block_id(head, number)?
            .ok_or(FinalityError::AncestorNotFound {
                head: *head,
                number,
            })
    }

    pub fn state_cache_stats(&self) -> crate::domain::CacheStats {
        self.states.stats()
    }

    /// Release the underlying store (for restarts in tests and tools).
    pub fn into_store(self) -> S {
        self.qualities.into_inner().into_inner()
    }
}

/// Latest checkpoint above `finalized` on the best chain whose round was
/// committed as justified.
fn restore_justified<R, S>(
    repo: &R,
    qualities: &mut QualityStore<S>,
    schedule: RoundSchedule,
    finalized: &BlockId,
) -> FinalityResult<Option<BlockId>>
where
    R: ChainRepository,
    S: KeyValueStore,
{
    let best = repo.best_header()?;
    let mut number = schedule.get_checkpoint(best.number);
    while number > finalized.number() && schedule.is_active(number) {
        let id = repo
            .get_block_id(&best.id, number)?
            .ok_or(FinalityError::AncestorNotFound {
                head: best.id,
                number,
            })?;
        if qualities.get(&id)?.unwrap_or(0) > 0 {
            return Ok(Some(id));
        }
        number = number.saturating_sub(schedule.interval());
    }
    Ok(None)
}

impl<R, S> Committer for Engine<R, S>
where
    R: ChainRepository,
    S: KeyValueStore,
{
    fn finalized(&self) -> FinalityResult<BlockId> {
        Ok(Engine::finalized(self))
    }

    fn justified(&self) -> FinalityResult<BlockId> {
        Ok(Engine::justified(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryKVStore;
    use crate::test_utils::MemoryChain;

    fn engine(chain: &Arc<MemoryChain>, master: Address) -> Engine<MemoryChain, InMemoryKVStore> {
        let config = FinalityConfig::default().with_interval(5);
        Engine::new(chain.clone(), InMemoryKVStore::new(), config, master).unwrap()
    }

    #[test]
    fn test_inactive_blocks_have_zero_state() {
        let chain = Arc::new(MemoryChain::new(3));
        let blocks = chain.extend_round_robin(&chain.genesis_id(), 4, |_| true);
        let config = FinalityConfig::default().with_interval(5).with_finality_fork(10);
        let mut engine =
            Engine::new(chain.clone(), InMemoryKVStore::new(), config, chain.authority(0)).unwrap();

        for header in &blocks {
            assert_eq!(engine.compute_state(header).unwrap(), BftState::default());
        }
        assert_eq!(engine.compute_state(&chain.genesis()).unwrap(), BftState::default());
    }

    #[test]
    fn test_preview_then_summary_within_round() {
        let chain = Arc::new(MemoryChain::new(3));
        let blocks = chain.extend_round_robin(&chain.genesis_id(), 5, |n| n != 2);
        let mut engine = engine(&chain, chain.authority(0));

        // block 1 committed by A: 1 of 2 needed
        let st = engine.compute_state(&blocks[0]).unwrap();
        assert_eq!(st, BftState::default());
        // block 3 committed by C: quorum reached
        let st = engine.compute_state(&blocks[2]).unwrap();
        assert!(st.justified);
        assert_eq!(st.quality, 1);
        let st = engine.compute_state(&blocks[4]).unwrap();
        assert_eq!(st, BftState { quality: 1, justified: true });
    }

    #[test]
    fn test_sibling_branches_do_not_share_a_tally() {
        let chain = Arc::new(MemoryChain::new(3));
        let trunk = chain.extend_round_robin(&chain.genesis_id(), 6, |_| true);
        let mut engine = engine(&chain, chain.authority(0));
        for header in &trunk {
            engine.commit_block(header, false).unwrap();
        }
        // leave a live tally cached at block 6 (signed by C)
        assert!(!engine.compute_state(&trunk[5]).unwrap().justified);

        // fork off block 6 twice with B voting differently
        let left = chain.extend_with(&trunk[5].id, &[(1, true)]);
        let right = chain.extend_with(&trunk[5].id, &[(1, false)]);

        let l = engine.compute_state(&left[0]).unwrap();
        let r = engine.compute_state(&right[0]).unwrap();
        assert!(l.justified);
        assert_eq!(l.quality, 2);
        assert!(!r.justified);
        assert_eq!(r.quality, 1);

        // both answers are stable once cached
        assert_eq!(engine.compute_state(&left[0]).unwrap(), l);
        assert_eq!(engine.compute_state(&right[0]).unwrap(), r);
    }

    #[test]
    fn test_accepts_only_finalized_branch() {
        let chain = Arc::new(MemoryChain::new(3));
        let trunk = chain.extend_round_robin(&chain.genesis_id(), 10, |_| true);
        let fork = chain.extend_round_robin(&trunk[2].id, 3, |_| true);
        let mut engine = engine(&chain, chain.authority(0));

        assert!(engine.accepts(&fork[2].id).unwrap());
        for header in &trunk {
            engine.commit_block(header, false).unwrap();
        }
        assert_eq!(engine.finalized(), trunk[4].id);
        assert!(engine.accepts(&trunk[9].id).unwrap());
        assert!(!engine.accepts(&fork[2].id).unwrap());
    }

    #[test]
    fn test_select_prefers_quality_then_height() {
        let chain = Arc::new(MemoryChain::new(3));
        let trunk = chain.extend_round_robin(&chain.genesis_id(), 5, |_| false);
        let mut engine = engine(&chain, chain.authority(0));
        for header in &trunk {
            engine.commit_block(header, false).unwrap();
        }
        chain.set_best(&trunk[4].id);

        let justified = chain.extend_round_robin(&chain.genesis_id(), 5, |_| true);
        assert!(engine.select(&justified[4]).unwrap());

        let shorter = chain.extend_round_robin(&chain.genesis_id(), 4, |_| false);
        assert!(!engine.select(&shorter[3]).unwrap());
    }
}
