//! # Quality Store
//!
//! Persisted records of the engine:
//!
//! | Key | Value |
//! |-----|-------|
//! | checkpoint id (32 bytes) | quality, bincode `u32` |
//! | `finalized` | finalized checkpoint, bincode `BlockId` |
//!
//! Qualities are write-once. Recent lookups are served from an LRU in front
//! of the store.

use crate::error::{FinalityError, FinalityResult};
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use lru::LruCache;
use shared_types::BlockId;
use std::num::NonZeroUsize;

/// Key of the persisted finalized checkpoint.
pub const FINALIZED_KEY: &[u8] = b"finalized";

/// Write-once checkpoint qualities plus the finalized marker.
pub struct QualityStore<S> {
    store: S,
    cache: LruCache<BlockId, u32>,
}

impl<S: KeyValueStore> QualityStore<S> {
    pub fn new(store: S, cache_size: usize) -> Self {
        let cap = NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            cache: LruCache::new(cap),
        }
    }

    /// Persisted quality of `checkpoint`, if any.
    pub fn get(&mut self, checkpoint: &BlockId) -> FinalityResult<Option<u32>> {
        if let Some(quality) = self.cache.get(checkpoint) {
            return Ok(Some(*quality));
        }

        let Some(raw) = self.store.get(checkpoint.as_bytes())? else {
            return Ok(None);
        };
        let quality: u32 = bincode::deserialize(&raw).map_err(|e| FinalityError::Corrupted {
            key: checkpoint.to_string(),
            reason: e.to_string(),
        })?;
        self.cache.put(*checkpoint, quality);
        Ok(Some(quality))
    }

    /// Batch operation persisting `quality` for `checkpoint`.
    ///
    /// `None` when the same value is already stored. A different stored
    /// value is a [`FinalityError::QualityConflict`].
    pub fn stage(
        &mut self,
        checkpoint: &BlockId,
        quality: u32,
    ) -> FinalityResult<Option<BatchOperation>> {
        match self.get(checkpoint)? {
            Some(stored) if stored == quality => Ok(None),
            Some(stored) => Err(FinalityError::QualityConflict {
                checkpoint: *checkpoint,
                stored,
                computed: quality,
            }),
            None => {
                let value = encode(&quality)?;
                Ok(Some(BatchOperation::put(checkpoint.as_bytes().to_vec(), value)))
            }
        }
    }

    /// Batch operation persisting the finalized checkpoint.
    pub fn stage_finalized(&self, finalized: &BlockId) -> FinalityResult<BatchOperation> {
        Ok(BatchOperation::put(FINALIZED_KEY.to_vec(), encode(finalized)?))
    }

    /// Apply staged operations atomically, then warm the cache with the
    /// qualities they carried.
    pub fn commit(
        &mut self,
        operations: Vec<BatchOperation>,
        qualities: &[(BlockId, u32)],
    ) -> FinalityResult<()> {
        if operations.is_empty() {
            return Ok(());
        }
        self.store.atomic_batch_write(operations)?;
        for (checkpoint, quality) in qualities {
            self.cache.put(*checkpoint, *quality);
        }
        Ok(())
    }

    /// Finalized checkpoint restored from the store.
    pub fn load_finalized(&self) -> FinalityResult<Option<BlockId>> {
        let Some(raw) = self.store.get(FINALIZED_KEY)? else {
            return Ok(None);
        };
        bincode::deserialize(&raw)
            .map(Some)
            .map_err(|e| FinalityError::Corrupted {
                key: "finalized".to_string(),
                reason: e.to_string(),
            })
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

fn encode<T: serde::Serialize>(value: &T) -> FinalityResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| FinalityError::Storage {
        reason: format!("encode failed: {}", e),
    })
}
