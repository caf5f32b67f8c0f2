//! Test harness around [`Consensus`]: owns a temp DB and offers block/tx
//! factories so tests can grow chains without hand-rolling headers.

use crate::{
    consensus::Consensus,
    errors::BlockProcessResult,
};
use std::{
    ops::Deref,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use vertex_consensus_core::{
    block::{Block, CompleteBlock},
    config::{
        params::{Params, SIMNET_PARAMS},
        Config,
    },
    miniblock::{past_digest, MiniBlock},
    tx::{Payload, ScOp, Transaction, TransactionType},
};
use vertex_database::prelude::{create_temp_db, TempDbLifetime};
use vertex_hashes::Hash;

pub struct TestConsensus {
    consensus: Arc<Consensus>,
    params: Params,
    nonce_counter: AtomicU64,
    _db_lifetime: TempDbLifetime,
}

impl TestConsensus {
    /// A fresh simulator-mode chain over a temp DB, genesis already seeded
    pub fn new() -> Self {
        Self::with_config(Config::new(SIMNET_PARAMS).with_simulator())
    }

    pub fn with_config(config: Config) -> Self {
        let (db_lifetime, db) = create_temp_db();
        let params = config.params.clone();
        let consensus = Consensus::with_defaults(config, db).expect("starting a fresh test chain cannot fail");
        Self { consensus, params, nonce_counter: AtomicU64::new(1), _db_lifetime: db_lifetime }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn dev_address(&self) -> Hash {
        self.params.dev_address
    }

    pub fn genesis_hash(&self) -> Hash {
        vertex_consensus_core::config::genesis::generate_genesis_block(&self.params).hash()
    }

    pub fn next_nonce(&self) -> Hash {
        Hash::from_u64(0x6e6f6e63_65000000 + self.nonce_counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Builds a block over the given tips: resolved height, monotonic
    /// timestamp, a dev-mined mini block and a dev coinbase
    pub fn build_block(&self, tips: Vec<Hash>, txs: Vec<Transaction>) -> CompleteBlock {
        let height = tips
            .iter()
            .map(|tip| self.consensus.get_block_height(*tip).expect("test blocks build on stored tips") + 1)
            .max()
            .unwrap_or(0);
        let timestamp = tips
            .iter()
            .filter_map(|tip| self.consensus.get_block(*tip).map(|b| b.timestamp))
            .max()
            .map(|parent_ts| parent_ts + 1)
            .unwrap_or(self.params.genesis_timestamp);

        let mini_blocks = if height == 0 {
            vec![]
        } else {
            vec![MiniBlock {
                version: 1,
                height,
                timestamp,
                key_hash: self.dev_address(),
                past_digest: past_digest(&tips),
                nonce: self.nonce_counter.fetch_add(1, Ordering::Relaxed),
            }]
        };
        let miner_tx = if height == 0 {
            vertex_consensus_core::config::genesis::generate_genesis_block(&self.params).block.miner_tx.clone()
        } else {
            Transaction {
                version: 1,
                tx_type: TransactionType::Coinbase,
                height,
                miner_address: self.dev_address(),
                allocations: vec![],
                payloads: vec![],
            }
        };

        let tx_hashes = txs.iter().map(|tx| tx.id()).collect();
        CompleteBlock::new(
            Block {
                major_version: self.params.version_at_height(height),
                height,
                timestamp,
                tips,
                mini_blocks,
                miner_tx,
                tx_hashes,
            },
            txs,
        )
    }

    /// Builds and submits a block, returning its hash
    pub fn add_block_at(&self, tips: Vec<Hash>, txs: Vec<Transaction>) -> BlockProcessResult<Hash> {
        let cbl = self.build_block(tips, txs);
        let hash = cbl.hash();
        self.consensus.add_block(cbl)?;
        Ok(hash)
    }

    /// Extends the chain with an empty block over the current best tips
    pub fn add_empty_block(&self) -> BlockProcessResult<Hash> {
        let mut tips = self.consensus.get_tips();
        tips.sort_by_key(|tip| (std::cmp::Reverse(self.consensus.get_block_height(*tip).unwrap_or(0)), *tip));
        tips.truncate(2);
        if tips.len() == 2 && self.consensus.get_block_height(tips[0]) != self.consensus.get_block_height(tips[1]) {
            tips.truncate(1);
        }
        self.add_block_at(tips, vec![])
    }

    /// A payment from `source` to `destination`, uniquely nonced
    pub fn transfer_tx(&self, source: Hash, destination: Hash, amount: u64, fee: u64, tx_height: u64) -> Transaction {
        Transaction {
            version: 1,
            tx_type: TransactionType::Normal,
            height: tx_height,
            miner_address: Hash::default(),
            allocations: vec![],
            payloads: vec![Payload {
                scid: Hash::default(),
                nonce: self.next_nonce(),
                source,
                destination,
                amount,
                burn: 0,
                fee,
                sc_ops: vec![],
            }],
        }
    }

    pub fn registration_tx(&self, address: Hash, tx_height: u64) -> Transaction {
        Transaction {
            version: 1,
            tx_type: TransactionType::Registration,
            height: tx_height,
            miner_address: address,
            allocations: vec![],
            payloads: vec![],
        }
    }

    /// An SC deployment carrying the given code; the SCID is the tx id
    pub fn sc_install_tx(&self, source: Hash, code: Vec<u8>, fee: u64, tx_height: u64) -> Transaction {
        Transaction {
            version: 1,
            tx_type: TransactionType::Sc,
            height: tx_height,
            miner_address: Hash::default(),
            allocations: vec![],
            payloads: vec![Payload {
                scid: Hash::default(),
                nonce: self.next_nonce(),
                source,
                destination: Hash::default(),
                amount: 0,
                burn: 0,
                fee,
                sc_ops: vec![ScOp::Install { code }],
            }],
        }
    }

    pub fn consensus(&self) -> Arc<Consensus> {
        self.consensus.clone()
    }
}

impl Default for TestConsensus {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for TestConsensus {
    type Target = Consensus;

    fn deref(&self) -> &Self::Target {
        &self.consensus
    }
}

impl Drop for TestConsensus {
    fn drop(&mut self) {
        self.consensus.shutdown();
    }
}
