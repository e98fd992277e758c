//! Test fixtures: an in-memory block tree implementing [`ChainRepository`].
//!
//! Block ids are keccak-derived and unique per appended block, so sibling
//! branches with identical signers still get distinct ids. The authority-set
//! size is encoded in each block's state root.

use crate::error::{FinalityError, FinalityResult};
use crate::ports::outbound::ChainRepository;
use parking_lot::RwLock;
use sha3::{Digest, Keccak256};
use shared_types::{Address, BlockHeader, BlockId, Hash};
use std::collections::HashMap;

const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
const BLOCK_TIME: u64 = 10;

struct ChainInner {
    headers: HashMap<BlockId, BlockHeader>,
    best: BlockId,
    max_proposers: u64,
    nonce: u64,
}

/// In-memory block tree with fork support.
pub struct MemoryChain {
    genesis: BlockHeader,
    authorities: Vec<Address>,
    inner: RwLock<ChainInner>,
}

impl MemoryChain {
    /// Chain holding only genesis, with `authority_count` round-robin signers.
    pub fn new(authority_count: usize) -> Self {
        let authorities: Vec<Address> = (0..authority_count.max(1))
            .map(|i| {
                let digest = keccak(&[b"authority".as_slice(), (i as u64).to_be_bytes().as_slice()]);
                let mut address = [0u8; 20];
                address.copy_from_slice(&digest[12..]);
                address
            })
            .collect();

        let max_proposers = authority_count as u64;
        let genesis = BlockHeader {
            id: BlockId::new(0, keccak(&[b"genesis".as_slice()])),
            parent_id: BlockId::default(),
            number: 0,
            signer: [0u8; 20],
            state_root: proposers_root(max_proposers),
            timestamp: GENESIS_TIMESTAMP,
            com: false,
        };

        let mut headers = HashMap::new();
        headers.insert(genesis.id, genesis.clone());
        Self {
            inner: RwLock::new(ChainInner {
                headers,
                best: genesis.id,
                max_proposers,
                nonce: 0,
            }),
            genesis,
            authorities,
        }
    }

    pub fn genesis(&self) -> BlockHeader {
        self.genesis.clone()
    }

    /// Signer address of authority `index` (wrapping).
    pub fn authority(&self, index: usize) -> Address {
        self.authorities[index % self.authorities.len()]
    }

    /// Authority-set size recorded in blocks appended from now on.
    pub fn set_max_proposers(&self, count: u64) {
        self.inner.write().max_proposers = count;
    }

    pub fn set_best(&self, id: &BlockId) {
        self.inner.write().best = *id;
    }

    pub fn header(&self, id: &BlockId) -> Option<BlockHeader> {
        self.inner.read().headers.get(id).cloned()
    }

    /// Append one block signed by authority `signer` on top of `parent`.
    ///
    /// The new block becomes best when it is higher than the current best.
    ///
    /// # Panics
    ///
    /// When `parent` is unknown.
    pub fn append(&self, parent: &BlockId, signer: usize, com: bool) -> BlockHeader {
        let mut inner = self.inner.write();
        let parent = inner
            .headers
            .get(parent)
            .cloned()
            .unwrap_or_else(|| panic!("unknown parent {:?}", parent));

        inner.nonce += 1;
        let number = parent.number + 1;
        let signer = self.authority(signer);
        let hash = keccak(&[
            parent.id.as_bytes().as_slice(),
            number.to_be_bytes().as_slice(),
            signer.as_slice(),
            [com as u8].as_slice(),
            inner.nonce.to_be_bytes().as_slice(),
        ]);

        let header = BlockHeader {
            id: BlockId::new(number, hash),
            parent_id: parent.id,
            number,
            signer,
            state_root: proposers_root(inner.max_proposers),
            timestamp: GENESIS_TIMESTAMP + number as u64 * BLOCK_TIME,
            com,
        };
        inner.headers.insert(header.id, header.clone());
        if number > inner.best.number() {
            inner.best = header.id;
        }
        header
    }

    /// Append `count` blocks on `parent`; block `n` is signed by authority
    /// `(n - 1) % authorities` and commits when `com(n)` holds.
    pub fn extend_round_robin<F>(&self, parent: &BlockId, count: usize, com: F) -> Vec<BlockHeader>
    where
        F: Fn(u32) -> bool,
    {
        let mut blocks = Vec::with_capacity(count);
        let mut tip = *parent;
        for _ in 0..count {
            let number = tip.number() + 1;
            let signer = (number as usize - 1) % self.authorities.len();
            let header = self.append(&tip, signer, com(number));
            tip = header.id;
            blocks.push(header);
        }
        blocks
    }

    /// Append blocks with explicit `(authority index, com)` pairs.
    pub fn extend_with(&self, parent: &BlockId, blocks: &[(usize, bool)]) -> Vec<BlockHeader> {
        let mut out = Vec::with_capacity(blocks.len());
        let mut tip = *parent;
        for (signer, com) in blocks {
            let header = self.append(&tip, *signer, *com);
            tip = header.id;
            out.push(header);
        }
        out
    }
}

impl ChainRepository for MemoryChain {
    fn genesis_id(&self) -> BlockId {
        self.genesis.id
    }

    fn best_header(&self) -> FinalityResult<BlockHeader> {
        let inner = self.inner.read();
        inner
            .headers
            .get(&inner.best)
            .cloned()
            .ok_or(FinalityError::BlockNotFound { id: inner.best })
    }

    fn get_header(&self, id: &BlockId) -> FinalityResult<Option<BlockHeader>> {
        Ok(self.inner.read().headers.get(id).cloned())
    }

    fn get_block_id(&self, head: &BlockId, number: u32) -> FinalityResult<Option<BlockId>> {
        let inner = self.inner.read();
        let mut cursor = inner
            .headers
            .get(head)
            .ok_or(FinalityError::BlockNotFound { id: *head })?;
        if number > cursor.number {
            return Ok(None);
        }
        while cursor.number > number {
            cursor = inner
                .headers
                .get(&cursor.parent_id)
                .ok_or(FinalityError::BlockNotFound {
                    id: cursor.parent_id,
                })?;
        }
        Ok(Some(cursor.id))
    }

    fn max_block_proposers(&self, state_root: &Hash) -> FinalityResult<u64> {
        let mut count = [0u8; 8];
        count.copy_from_slice(&state_root[..8]);
        Ok(u64::from_be_bytes(count))
    }
}

fn proposers_root(count: u64) -> Hash {
    let mut root = keccak(&[b"state".as_slice(), count.to_be_bytes().as_slice()]);
    root[..8].copy_from_slice(&count.to_be_bytes());
    root
}

fn keccak(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forks_resolve_by_branch() {
        let chain = MemoryChain::new(3);
        let trunk = chain.extend_round_robin(&chain.genesis_id(), 6, |_| true);
        let fork = chain.extend_round_robin(&trunk[1].id, 3, |_| true);

        assert_eq!(trunk[0].signer, chain.authority(0));
        assert_eq!(trunk[3].signer, chain.authority(0));
        assert_ne!(trunk[2].id, fork[0].id);
        assert_eq!(
            chain.get_block_id(&fork[2].id, 2).unwrap(),
            Some(trunk[1].id)
        );
        assert!(chain.has_block(&trunk[5].id, &trunk[2].id).unwrap());
        assert!(!chain.has_block(&fork[2].id, &trunk[2].id).unwrap());
        assert_eq!(chain.get_block_id(&fork[0].id, 9).unwrap(), None);
        assert_eq!(chain.best_header().unwrap().id, trunk[5].id);
    }

    #[test]
    fn test_proposer_count_lives_in_state_root() {
        let chain = MemoryChain::new(3);
        assert_eq!(
            chain.max_block_proposers(&chain.genesis().state_root).unwrap(),
            3
        );
        chain.set_max_proposers(7);
        let block = chain.append(&chain.genesis_id(), 0, false);
        assert_eq!(chain.max_block_proposers(&block.state_root).unwrap(), 7);
    }
}
