use crate::errors::{BlockProcessResult, RuleError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use vertex_consensus_core::{
    block::Block,
    miniblock::{past_digest, MiniBlock},
    verifier::PowVerifier,
};
use vertex_hashes::Hash;

/// Accept-all PoW predicate for simulator and devnet runs, where difficulty is
/// pinned to 1. Production deployments inject the real PoW engine.
pub struct DevPowVerifier;

impl PowVerifier for DevPowVerifier {
    fn verify_miniblock_pow(&self, _block: &Block, _mini_block: &MiniBlock, _difficulty: u64) -> bool {
        true
    }
}

/// In-memory collection of mini blocks flowing in from miners, keyed by
/// height. Entries below the stable height are purged after every accepted
/// block since they can no longer end up inside a valid block.
pub struct MiniBlocksCollection {
    inner: Mutex<BTreeMap<u64, Vec<MiniBlock>>>,
}

impl MiniBlocksCollection {
    pub fn new() -> Self {
        Self { inner: Mutex::new(BTreeMap::new()) }
    }

    /// Inserts a mini block, returns false for duplicates
    pub fn insert(&self, mb: MiniBlock) -> bool {
        let mut inner = self.inner.lock();
        let entry = inner.entry(mb.height).or_default();
        if entry.iter().any(|existing| existing.hash() == mb.hash()) {
            return false;
        }
        entry.push(mb);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Purges all mini blocks at or below `height`, returning the purged count
    pub fn purge_below(&self, height: u64) -> usize {
        let mut inner = self.inner.lock();
        let before: usize = inner.values().map(|v| v.len()).sum();
        inner.retain(|&h, _| h > height);
        before - inner.values().map(|v| v.len()).sum::<usize>()
    }
}

impl Default for MiniBlocksCollection {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural verification of the mini blocks aggregated by a block: genesis
/// carries none, every other block carries between one and `max` mini blocks,
/// all distinct and all declaring the block's height.
pub fn verify_miniblocks(block: &Block, max: usize) -> BlockProcessResult<()> {
    if block.height == 0 {
        if !block.mini_blocks.is_empty() {
            return Err(RuleError::InvalidBlock("genesis block cannot carry mini blocks".into()));
        }
        return Ok(());
    }
    if block.mini_blocks.is_empty() {
        return Err(RuleError::InvalidBlock("block carries no mini blocks".into()));
    }
    if block.mini_blocks.len() > max {
        return Err(RuleError::InvalidBlock(format!(
            "block carries {} mini blocks where the limit is {}",
            block.mini_blocks.len(),
            max
        )));
    }
    let mut seen: Vec<Hash> = Vec::with_capacity(block.mini_blocks.len());
    for mb in &block.mini_blocks {
        if mb.height != block.height {
            return Err(RuleError::InvalidBlock(format!("mini block height {} does not match block height {}", mb.height, block.height)));
        }
        let hash = mb.hash();
        if seen.contains(&hash) {
            return Err(RuleError::InvalidBlock("duplicate mini block".into()));
        }
        seen.push(hash);
    }
    Ok(())
}

/// Verifies every mini block commits to the past of the block carrying it,
/// guarding against corrupted or transplanted mini blocks
pub fn verify_miniblocks_hash_check(block: &Block) -> BlockProcessResult<()> {
    let expected = past_digest(&block.tips);
    for mb in &block.mini_blocks {
        if mb.past_digest != expected {
            return Err(RuleError::InvalidBlock("mini block does not commit to the block past".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mb(height: u64, nonce: u64) -> MiniBlock {
        MiniBlock { version: 1, height, timestamp: 0, key_hash: 1.into(), past_digest: past_digest(&[]), nonce }
    }

    #[test]
    fn test_collection_dedup_and_purge() {
        let collection = MiniBlocksCollection::new();
        assert!(collection.insert(mb(5, 1)));
        assert!(!collection.insert(mb(5, 1)));
        assert!(collection.insert(mb(5, 2)));
        assert!(collection.insert(mb(9, 1)));
        assert_eq!(collection.len(), 3);

        assert_eq!(collection.purge_below(5), 2);
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_verify_miniblocks_structure() {
        let mut block = Block {
            major_version: 1,
            height: 5,
            timestamp: 0,
            tips: vec![],
            mini_blocks: vec![mb(5, 1), mb(5, 2)],
            miner_tx: coinbase(),
            tx_hashes: vec![],
        };
        assert!(verify_miniblocks(&block, 10).is_ok());
        assert!(verify_miniblocks_hash_check(&block).is_ok());

        block.mini_blocks.push(mb(4, 3));
        assert!(verify_miniblocks(&block, 10).is_err());
        block.mini_blocks.pop();

        block.mini_blocks.push(mb(5, 1));
        assert!(verify_miniblocks(&block, 10).is_err());
        block.mini_blocks.pop();

        block.tips = vec![9.into()];
        assert!(verify_miniblocks_hash_check(&block).is_err());
    }

    pub(super) fn coinbase() -> vertex_consensus_core::tx::Transaction {
        vertex_consensus_core::tx::Transaction {
            version: 1,
            tx_type: vertex_consensus_core::tx::TransactionType::Coinbase,
            height: 5,
            miner_address: 1.into(),
            allocations: vec![],
            payloads: vec![],
        }
    }
}
