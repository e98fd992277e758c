//! Driven Ports (SPI - Outbound Dependencies)
//!
//! The engine reads the chain through [`ChainRepository`] and persists its
//! records through [`KeyValueStore`]. Both are implemented by the host.

use crate::error::{FinalityResult, KVStoreError};
use shared_types::{BlockHeader, BlockId, Hash};

/// Read access to the block tree.
///
/// Production: the node's chain database.
/// Testing: `MemoryChain` (test_utils.rs)
pub trait ChainRepository: Send + Sync {
    /// Id of the genesis block
    fn genesis_id(&self) -> BlockId;

    /// Head of the current best chain
    fn best_header(&self) -> FinalityResult<BlockHeader>;

    /// Look up a header by id, `None` when unknown
    fn get_header(&self, id: &BlockId) -> FinalityResult<Option<BlockHeader>>;

    /// Id of the block numbered `number` on the branch ending at `head`.
    ///
    /// `None` when `number` is above `head`.
    fn get_block_id(&self, head: &BlockId, number: u32) -> FinalityResult<Option<BlockId>>;

    /// Whether `id` is on the branch ending at `head` (inclusive).
    fn has_block(&self, head: &BlockId, id: &BlockId) -> FinalityResult<bool> {
        if id.number() > head.number() {
            return Ok(false);
        }
        Ok(self.get_block_id(head, id.number())?.as_ref() == Some(id))
    }

    /// Size of the authority set recorded in the given state
    fn max_block_proposers(&self, state_root: &Hash) -> FinalityResult<u64>;
}

/// Abstract interface for key-value database operations.
///
/// Production: `RocksDbStore` (adapters/rocksdb.rs, `rocksdb` feature)
/// Testing: `InMemoryKVStore` (adapters/memory.rs)
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key.
    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch succeed, or NONE are applied.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}
