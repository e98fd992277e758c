//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Primitives**: `Hash`, `Address`
//! - **Chain**: `BlockId`, `BlockHeader`

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CLUSTER A: PRIMITIVES
// =============================================================================

/// A 32-byte hash.
pub type Hash = [u8; 32];

/// A 20-byte Ethereum-style address (authority / block signer).
pub type Address = [u8; 20];

// =============================================================================
// CLUSTER B: THE CHAIN
// =============================================================================

/// Block identifier.
///
/// The first four bytes hold the big-endian block number, the remaining
/// 28 bytes come from the block hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct BlockId(pub Hash);

impl BlockId {
    /// Build an id for block `number` from a block hash.
    ///
    /// The number prefix overwrites the first four bytes of `hash`.
    pub fn new(number: u32, hash: Hash) -> Self {
        let mut bytes = hash;
        bytes[..4].copy_from_slice(&number.to_be_bytes());
        Self(bytes)
    }

    /// Block number encoded in the id.
    pub fn number(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Raw bytes of the id.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<Hash> for BlockId {
    fn from(bytes: Hash) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for BlockId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId(#{} 0x{}…)", self.number(), hex::encode(&self.0[4..10]))
    }
}

/// The header of a PoA block, reduced to the fields finality consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Identifier of this block (number-prefixed).
    pub id: BlockId,
    /// Identifier of the parent block.
    pub parent_id: BlockId,
    /// Block height in the chain.
    pub number: u32,
    /// Authority that signed the block (recovered from its signature).
    pub signer: Address,
    /// Root hash of the state trie after applying this block.
    pub state_root: Hash,
    /// Unix timestamp when the block was proposed.
    pub timestamp: u64,
    /// Commit vote ("COM") bit set by the proposer.
    pub com: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_encodes_number() {
        let id = BlockId::new(0x0102_0304, [0xAB; 32]);
        assert_eq!(id.number(), 0x0102_0304);
        assert_eq!(&id.0[..4], &[1, 2, 3, 4]);
        assert_eq!(&id.0[4..], &[0xAB; 28]);
    }

    #[test]
    fn test_block_id_ordering_follows_number() {
        let low = BlockId::new(5, [0xFF; 32]);
        let high = BlockId::new(6, [0x00; 32]);
        assert!(low < high);
    }

    #[test]
    fn test_block_id_display_is_hex() {
        let id = BlockId::new(1, [0u8; 32]);
        assert_eq!(
            id.to_string(),
            "0x0000000100000000000000000000000000000000000000000000000000000000"
        );
        assert!(format!("{:?}", id).starts_with("BlockId(#1 "));
    }

    #[test]
    fn test_block_id_serde_roundtrip_through_bincode() {
        let id = BlockId::new(42, [7u8; 32]);
        let bytes = bincode::serialize(&id).unwrap();
        let decoded: BlockId = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, id);
    }
}
