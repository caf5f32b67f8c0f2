use crate::{
    constants::{perf::ADDRESS_VALID_CACHE_SIZE, store_names},
    errors::{BlockProcessResult, RuleError},
    model::stores::topo_index::DbTopoStore,
    processes::{
        dag::DagIndex,
        difficulty::DifficultyManager,
        miniblocks::{verify_miniblocks, verify_miniblocks_hash_check},
        transaction_validator::{BlockBodyAccumulator, TransactionValidator},
    },
};
use log::warn;
use lru::LruCache;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::{collections::HashSet, num::NonZeroUsize, sync::Arc};
use vertex_consensus_core::{
    account::AccountKey,
    block::CompleteBlock,
    config::Config,
    verifier::PowVerifier,
    BlockHashSet,
};
use vertex_core::time::unix_now;
use vertex_hashes::Hash;
use vertex_statestore::StateStore;

/// Context checks for incoming blocks. All reads happen under the chain write
/// lock taken by the ingress, so tip and height snapshots are consistent for
/// the duration of a validation.
pub struct BlockValidator {
    config: Arc<Config>,
    topo_store: Arc<DbTopoStore>,
    dag: DagIndex,
    state_store: StateStore,
    difficulty_manager: Arc<DifficultyManager>,
    transaction_validator: Arc<TransactionValidator>,
    pow_verifier: Arc<dyn PowVerifier>,
    thread_pool: Arc<rayon::ThreadPool>,
    // Memoizes (account, state version) registration lookups
    address_valid_cache: Mutex<LruCache<(AccountKey, u64), bool>>,
}

impl BlockValidator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        topo_store: Arc<DbTopoStore>,
        dag: DagIndex,
        state_store: StateStore,
        difficulty_manager: Arc<DifficultyManager>,
        transaction_validator: Arc<TransactionValidator>,
        pow_verifier: Arc<dyn PowVerifier>,
        thread_pool: Arc<rayon::ThreadPool>,
    ) -> Self {
        Self {
            config,
            topo_store,
            dag,
            state_store,
            difficulty_manager,
            transaction_validator,
            pow_verifier,
            thread_pool,
            address_valid_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(ADDRESS_VALID_CACHE_SIZE).expect("cache bound is non-zero"),
            )),
        }
    }

    /// Whether the account is registered in the balance tree of the latest
    /// committed snapshot
    pub fn is_address_registered(&self, key: AccountKey) -> bool {
        let snapshot = match self.state_store.load_snapshot(0) {
            Ok(snapshot) => snapshot,
            Err(_) => return false,
        };
        let cache_key = (key, snapshot.version());
        if let Some(valid) = self.address_valid_cache.lock().get(&cache_key) {
            return *valid;
        }
        let valid = snapshot
            .get_tree(store_names::BALANCE_TREE)
            .map(|tree| tree.contains(key.as_ref()))
            .unwrap_or(false);
        self.address_valid_cache.lock().put(cache_key, valid);
        valid
    }

    /// Runs the full ordered check sequence over a complete block. Checks are
    /// short-circuiting: the first failing rule decides the returned error.
    /// On success returns the resolved block height.
    ///
    /// `skip_tx_verification` is set while fast-syncing below the known chain
    /// tip; everything structural still runs.
    pub fn validate(
        &self,
        cbl: &CompleteBlock,
        current_tips: &BlockHashSet,
        chain_height: u64,
        skip_tx_verification: bool,
    ) -> BlockProcessResult<u64> {
        let block = &cbl.block;
        let block_hash = block.hash();

        // 1. The block must be new: neither a current tip nor already ordered
        if current_tips.contains(&block_hash) || self.topo_store.is_block_ordered(block_hash) {
            return Err(RuleError::AlreadyExists);
        }

        // 2. Only 2 tips allowed in a block
        if block.tips.len() >= 3 {
            return Err(RuleError::PastMissing(block.tips.clone()));
        }

        // 3. Every tip must already be on disk (alt-tips might not be ordered yet)
        let missing: Vec<Hash> = block.tips.iter().copied().filter(|tip| !self.dag.block_exists(*tip)).collect();
        if !missing.is_empty() {
            return Err(RuleError::PastMissing(missing));
        }

        // 4. Height coherence: the resolved height sits exactly one above every tip,
        // and the declared height must agree with it
        let block_height = self.dag.height_at_tips(&block.tips).expect("tip existence was checked above");
        for tip in &block.tips {
            if block_height != self.dag.height_at(*tip).expect("tip existence was checked above") + 1 {
                return Err(RuleError::InvalidBlock("a tip lies too far in the past".into()));
            }
        }
        if block.height == 0 && !block.tips.is_empty() {
            return Err(RuleError::InvalidBlock("genesis block cannot have tips".into()));
        }
        if block.height != block_height {
            return Err(RuleError::InvalidBlock(format!(
                "declared height {} does not match resolved height {}",
                block.height, block_height
            )));
        }

        // 5. Staleness: blocks below the stable height can no longer be merged
        if block_height != 0 && block_height < chain_height.saturating_sub(self.config.stable_limit) {
            return Err(RuleError::InvalidBlock(format!("block height {block_height} is below the stable height")));
        }

        // 6. The timestamp may only run marginally ahead of our clock
        let max_timestamp = unix_now() + self.config.timestamp_slack_ms;
        if block.timestamp > max_timestamp {
            return Err(RuleError::FutureTimestamp(block.timestamp, max_timestamp));
        }

        // 7. The clock must not run in reverse along any tip edge
        for tip in &block.tips {
            let parent_timestamp = self.dag.timestamp_at(*tip).expect("tip existence was checked above");
            if parent_timestamp > block.timestamp {
                return Err(RuleError::InvalidTimestamp(block.timestamp, parent_timestamp));
            }
        }

        // 8. Hard-fork version gate
        if block.major_version != self.config.version_at_height(block_height) {
            return Err(RuleError::InvalidBlock(format!("block version {} is invalid at height {block_height}", block.major_version)));
        }

        // 9. DAG shape rule, checkable once two levels of history exist
        if block_height >= 2 && !self.dag.check_dag_structure(&block.tips).expect("tip existence was checked above") {
            return Err(RuleError::InvalidBlock("tips fail the reachability rule".into()));
        }

        // 10. Size limit over the carried transactions
        let mut block_size = 0u64;
        for tx in cbl.transactions.iter() {
            block_size += tx.serialized_size();
            if block_size >= self.config.max_block_size {
                return Err(RuleError::InvalidSize(block_size, self.config.max_block_size));
            }
        }

        // 11. Mini blocks: structure and dynamism, linkage to this block, registered
        // miners, and proof of work
        verify_miniblocks(block, self.config.miniblocks_per_block)?;
        if block_height != 0 {
            verify_miniblocks_hash_check(block)?;
        }
        for mb in &block.mini_blocks {
            if !self.is_address_registered(mb.key_hash) {
                return Err(RuleError::InvalidBlock("mini block miner address not registered".into()));
            }
        }
        let difficulty = self.difficulty_manager.difficulty_at_tips(&block.tips);
        for mb in &block.mini_blocks {
            if !self.pow_verifier.verify_miniblock_pow(block, mb, difficulty) {
                return Err(RuleError::InvalidPow);
            }
        }

        // 12. Miner tx: premine exactly at genesis, verified coinbase elsewhere
        if block_height == 0 && !block.miner_tx.is_premine() {
            return Err(RuleError::InvalidBlock("genesis block must carry a premine miner tx".into()));
        }
        if block_height != 0 {
            if !block.miner_tx.is_coinbase() {
                return Err(RuleError::InvalidBlock("miner tx is not a coinbase".into()));
            }
            if !self.is_address_registered(block.miner_tx.miner_address) {
                return Err(RuleError::InvalidBlock("coinbase miner address not registered".into()));
            }
        }

        // 13. The tx payloads must match the declared hashes one-to-one
        if block.tx_hashes.len() != cbl.transactions.len() {
            return Err(RuleError::InvalidBlock(format!(
                "incomplete block: expected {} txs but got {}",
                block.tx_hashes.len(),
                cbl.transactions.len()
            )));
        }
        let checklist: HashSet<Hash> = block.tx_hashes.iter().copied().collect();
        if checklist.len() != block.tx_hashes.len() {
            return Err(RuleError::InvalidBlock("block declares duplicate tx hashes".into()));
        }
        for tx in cbl.transactions.iter() {
            if !checklist.contains(&tx.id()) {
                return Err(RuleError::InvalidBlock(format!("tx {} is not declared by the block", tx.id())));
            }
        }

        // 14. Block-wide duplicate detectors: registrations by address, payload
        // proof nonces across all transactions
        let mut reg_addresses: HashSet<AccountKey> = HashSet::new();
        for tx in cbl.transactions.iter().filter(|tx| tx.is_registration()) {
            if !reg_addresses.insert(tx.miner_address) {
                return Err(RuleError::TxDoubleSpend);
            }
        }
        let mut nonces: HashSet<Hash> = HashSet::new();
        for tx in cbl.transactions.iter().filter(|tx| tx.carries_nonces()) {
            for payload in &tx.payloads {
                if !nonces.insert(payload.nonce) {
                    return Err(RuleError::TxDoubleSpend);
                }
            }
        }

        if !skip_tx_verification {
            let hf_version = self.config.version_at_height(block_height);

            // 15. Every tx's nonces checked against the tips, fanned out over the pool
            let fail_count = self.thread_pool.install(|| {
                cbl.transactions
                    .par_iter()
                    .filter(|tx| {
                        if let Err(err) = self.transaction_validator.verify_nonce_against_tips(tx, &block.tips, hf_version) {
                            warn!("tx {} nonce verification failed: {}", tx.id(), err);
                            true
                        } else {
                            false
                        }
                    })
                    .count()
            });
            if fail_count > 0 {
                return Err(RuleError::InvalidTx);
            }

            // 16. Full cryptographic verification, fanned out over the pool
            let fail_count = self.thread_pool.install(|| {
                cbl.transactions
                    .par_iter()
                    .filter(|tx| {
                        if let Err(err) = self.transaction_validator.verify_transaction(tx, hf_version) {
                            warn!("tx {} verification failed: {}", tx.id(), err);
                            true
                        } else {
                            false
                        }
                    })
                    .count()
            });
            if fail_count > 0 {
                return Err(RuleError::InvalidTx);
            }
        }

        // 17. Cross-tx sanity within the block
        let mut accumulator = BlockBodyAccumulator::default();
        for tx in cbl.transactions.iter().filter(|tx| !(tx.is_coinbase() || tx.is_registration())) {
            if let Err(err) = accumulator.check(tx) {
                warn!("tx {} conflicts within block: {}", tx.id(), err);
                return Err(RuleError::InvalidTx);
            }
            accumulator.record(tx);
        }

        Ok(block_height)
    }
}
