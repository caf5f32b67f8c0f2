use crate::{hashing, miniblock::MiniBlock, tx::Transaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vertex_hashes::Hash;

/// A block header-plus-skeleton: transactions are referenced by hash only.
/// The hash is a content hash over all fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub major_version: u8,
    /// Self-declared height; validated against the resolved tip heights
    pub height: u64,
    /// Milliseconds since UNIX epoch
    pub timestamp: u64,
    /// 0-2 parent blocks this block builds on
    pub tips: Vec<Hash>,
    pub mini_blocks: Vec<MiniBlock>,
    /// Premine at genesis, coinbase everywhere else
    pub miner_tx: Transaction,
    pub tx_hashes: Vec<Hash>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        hashing::block_hash(self)
    }

    pub fn is_genesis(&self) -> bool {
        self.tips.is_empty()
    }
}

/// A block together with the transaction payloads matching `tx_hashes`
/// one-to-one. Inner Arcs make cloning cheap across threads.
#[derive(Clone, Debug)]
pub struct CompleteBlock {
    pub block: Arc<Block>,
    pub transactions: Arc<Vec<Transaction>>,
}

impl CompleteBlock {
    pub fn new(block: Block, transactions: Vec<Transaction>) -> Self {
        Self { block: Arc::new(block), transactions: Arc::new(transactions) }
    }

    pub fn from_block(block: Block) -> Self {
        Self::new(block, Vec::new())
    }

    pub fn hash(&self) -> Hash {
        self.block.hash()
    }

    /// Sum of the serialized sizes of the carried transactions. The block
    /// header and miner tx are excluded, matching the block size limit rule.
    pub fn transactions_size(&self) -> u64 {
        self.transactions.iter().map(|tx| tx.serialized_size()).sum()
    }
}
