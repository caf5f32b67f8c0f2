pub mod monitor;
pub mod notify;
pub mod test_consensus;

use crate::{
    constants::{
        perf::{CACHE_SIZE, MINING_BLOCKS_CACHE_SIZE},
        store_names,
    },
    errors::{BlockProcessResult, RuleError},
    model::stores::{
        block_store::{BlockStoreReader, DbBlockStore},
        topo_index::{DbTopoStore, TopoRecord},
        transactions::DbTransactionsStore,
    },
    pool::{Mempool, Regpool},
    processes::{
        dag::DagIndex,
        difficulty::DifficultyManager,
        executor::Executor,
        linearizer::Linearizer,
        miniblocks::{DevPowVerifier, MiniBlocksCollection},
        transaction_validator::{StructuralProofVerifier, TransactionValidator},
        validator::BlockValidator,
    },
};
use crossbeam_channel::{unbounded, Sender};
use log::{debug, error, info, warn};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use rocksdb::WriteBatch;
use std::{
    num::NonZeroUsize,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Instant,
};
use vertex_consensus_core::{
    account::AccountKey,
    block::{Block, CompleteBlock},
    config::{genesis::generate_genesis_block, Config},
    counters::ProcessingCounters,
    errors::{TxResult, TxRuleError},
    miniblock::MiniBlock,
    pool::{MempoolStore, RegpoolStore},
    tx::{Transaction, TransactionId, TransactionType},
    verifier::{PowVerifier, ProofVerifier},
    BlockHashSet, ForkVersion,
};
use vertex_core::time::unix_now;
use vertex_database::prelude::{BatchDbWriter, StoreResultExtensions, DB};
use vertex_hashes::{ContentHasher, Hash};
use vertex_statestore::StateStore;

/// A block ceases counting as caught-up syncing once its timestamp is within
/// this many milliseconds of local time
const SYNC_HORIZON_MS: u64 = 3_600_000;

/// Where a mined transaction ended up: the block that made it effective, if
/// any, and the side blocks that also carried it
#[derive(Debug, Default, Clone)]
pub struct TxValidity {
    pub valid_in: Option<Hash>,
    pub invalid_in: Vec<Hash>,
}

impl TxValidity {
    pub fn is_valid(&self) -> bool {
        self.valid_in.is_some()
    }
}

/// Chain fields guarded by the single writer lock
struct ChainInner {
    tips: BlockHashSet,
    height: u64,
    top_id: Hash,
}

/// The chain engine. All mutating entry points (`add_block`, `rewind_chain`,
/// `shutdown`) serialize on the inner writer lock; queries take the reader or
/// hit the lock-free height mirror.
pub struct Consensus {
    db: Arc<DB>,
    config: Arc<Config>,

    // Stores
    block_store: Arc<DbBlockStore>,
    tx_store: Arc<DbTransactionsStore>,
    topo_store: Arc<DbTopoStore>,
    state_store: StateStore,

    // Services and managers
    dag: DagIndex,
    validator: BlockValidator,
    linearizer: Linearizer,
    executor: Executor,
    difficulty_manager: Arc<DifficultyManager>,
    transaction_validator: Arc<TransactionValidator>,

    // Chain state
    chain: RwLock<ChainInner>,
    height_mirror: AtomicU64,
    synced: AtomicBool,

    // External collaborators
    mempool: Arc<dyn MempoolStore>,
    regpool: Arc<dyn RegpoolStore>,

    // Mini blocks flowing in from miners
    pub mini_blocks: MiniBlocksCollection,
    mining_blocks_cache: Mutex<LruCache<Hash, CompleteBlock>>,

    // Notification condition variables, broadcast after the lock is released
    pub notify_new_block: notify::Notify,
    pub notify_height_changed: notify::Notify,
    pub notify_new_mini_block: notify::Notify,

    // Counters and lifecycle
    pub counters: Arc<ProcessingCounters>,
    exit_sender: Mutex<Option<Sender<()>>>,
    monitor_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Consensus {
    /// Brings the chain up: opens the stores, seeds genesis on a fresh state
    /// store, loads the chain from disk and starts the metrics dumper.
    pub fn start(
        config: Config,
        db: Arc<DB>,
        mempool: Arc<dyn MempoolStore>,
        regpool: Arc<dyn RegpoolStore>,
        proof_verifier: Arc<dyn ProofVerifier>,
        pow_verifier: Arc<dyn PowVerifier>,
    ) -> BlockProcessResult<Arc<Self>> {
        info!("initialising the chain core");
        let config = Arc::new(config);
        info!("will use integrator address {}", config.integrator_address());

        let block_store = Arc::new(DbBlockStore::new(db.clone(), CACHE_SIZE));
        let tx_store = Arc::new(DbTransactionsStore::new(db.clone(), CACHE_SIZE));
        let topo_store = Arc::new(DbTopoStore::new(db.clone(), CACHE_SIZE));
        let state_store = StateStore::new(db.clone());

        let dag = DagIndex::new(block_store.clone());
        let difficulty_manager = Arc::new(DifficultyManager::new(dag.clone(), &config.params, config.simulator));
        let transaction_validator = Arc::new(TransactionValidator::new(
            dag.clone(),
            block_store.clone(),
            tx_store.clone(),
            proof_verifier,
            config.tx_validity_height,
            config.fee_per_byte,
        ));
        let thread_pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
                .thread_name(|i| format!("tx-verifier-{i}"))
                .build()
                .expect("building the verification pool cannot fail"),
        );
        let validator = BlockValidator::new(
            config.clone(),
            topo_store.clone(),
            dag.clone(),
            state_store.clone(),
            difficulty_manager.clone(),
            transaction_validator.clone(),
            pow_verifier,
            thread_pool,
        );
        let counters = Arc::new(ProcessingCounters::default());
        let executor = Executor::new(
            block_store.clone(),
            tx_store.clone(),
            topo_store.clone(),
            state_store.clone(),
            config.base_reward,
            counters.clone(),
        );
        let linearizer = Linearizer::new(dag.clone(), topo_store.clone());

        let (exit_sender, exit_receiver) = unbounded();
        let this = Arc::new(Self {
            db,
            config: config.clone(),
            block_store,
            tx_store,
            topo_store,
            state_store,
            dag,
            validator,
            linearizer,
            executor,
            difficulty_manager,
            transaction_validator,
            chain: RwLock::new(ChainInner { tips: BlockHashSet::new(), height: 0, top_id: Hash::default() }),
            height_mirror: AtomicU64::new(0),
            synced: AtomicBool::new(true),
            mempool,
            regpool,
            mini_blocks: MiniBlocksCollection::new(),
            mining_blocks_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(MINING_BLOCKS_CACHE_SIZE).expect("cache bound is non-zero"),
            )),
            notify_new_block: notify::Notify::new(),
            notify_height_changed: notify::Notify::new(),
            notify_new_mini_block: notify::Notify::new(),
            counters: counters.clone(),
            exit_sender: Mutex::new(Some(exit_sender)),
            monitor_handle: Mutex::new(None),
        });

        if !this.state_store.is_initialized() {
            info!("Genesis block not in store, add it now");
            let genesis = generate_genesis_block(&config.params);
            this.add_block(genesis).inspect_err(|err| {
                error!("Failed to add genesis block, we can no longer continue: {err}");
            })?;
        }

        this.init_chain_from_db();

        if this.get_height() <= 1 && config.fastsync {
            this.synced.store(false, Ordering::Relaxed);
        }

        *this.monitor_handle.lock() = Some(monitor::spawn_monitor(counters, config.node_tag.clone(), exit_receiver));
        Ok(this)
    }

    /// `start` with the reference pools and the structural/dev verifiers
    pub fn with_defaults(config: Config, db: Arc<DB>) -> BlockProcessResult<Arc<Self>> {
        let mempool = Arc::new(Mempool::new(2 * config.tx_validity_height));
        let regpool = Arc::new(Regpool::new());
        Self::start(config, db, mempool, regpool, Arc::new(StructuralProofVerifier), Arc::new(DevPowVerifier))
    }

    /// This is the only entrypoint for new and old blocks, even for genesis.
    /// The entire block is added atomically: once `Ok` is returned the block
    /// is permanent. Typed errors leave chain state untouched.
    pub fn add_block(&self, cbl: CompleteBlock) -> BlockProcessResult<()> {
        self.counters.blocks_submitted.fetch_add(1, Ordering::Relaxed);
        let block_hash = cbl.hash();
        let processing_start = Instant::now();

        let mut chain = self.chain.write();

        // Validation phase: reads only. A panic in here is an anomaly of the
        // incoming data, not of our state, so it demotes to a typed rejection.
        let skip_tx_verification = !self.synced.load(Ordering::Relaxed);
        let block_height = match catch_unwind(AssertUnwindSafe(|| {
            self.validator.validate(&cbl, &chain.tips, chain.height, skip_tx_verification)
        })) {
            Ok(Ok(height)) => height,
            Ok(Err(err)) => {
                self.counters.blocks_rejected.fetch_add(1, Ordering::Relaxed);
                warn!("Block {block_hash} rejected by chain: {err}");
                return Err(err);
            }
            Err(_) => {
                self.counters.blocks_rejected.fetch_add(1, Ordering::Relaxed);
                error!("Recovered while adding new block {block_hash}");
                return Err(RuleError::Panic);
            }
        };

        // Commit phase. First the txs, then the block record; a persistence
        // failure from here on is fatal, integrity outranks liveness.
        let mut batch = WriteBatch::default();
        for (txhash, tx) in cbl.block.tx_hashes.iter().zip(cbl.transactions.iter()) {
            self.tx_store
                .insert(BatchDbWriter::new(&mut batch), *txhash, Arc::new(tx.clone()))
                .unwrap_or_else(|err| panic!("cannot persist tx {txhash}: {err}"));
        }
        self.block_store
            .insert(BatchDbWriter::new(&mut batch), cbl.block.clone())
            .unwrap_or_else(|err| panic!("cannot persist block {block_hash}: {err}"));
        self.db.write(batch).unwrap_or_else(|err| panic!("cannot persist block {block_hash}: {err}"));

        // A block on a lower-height tip does not move the chain height and
        // therefore gets no topological slot yet; a later merge orders it
        let height_changed = block_height > chain.height || self.topo_store.count() == 0;
        if height_changed {
            let (full_order, base_topo_index) = if cbl.block.is_genesis() {
                (vec![block_hash], 0)
            } else {
                self.linearizer.generate_full_order(chain.top_id, block_hash).inspect_err(|err| {
                    self.counters.blocks_rejected.fetch_add(1, Ordering::Relaxed);
                    warn!("Block {block_hash} rejected by chain: {err}");
                })?
            };
            debug!("full order data: {full_order:?} base_topo_index {base_topo_index}");

            self.executor.execute_order(&full_order, base_topo_index);

            chain.height = block_height;
            chain.top_id = block_hash;
            self.height_mirror.store(block_height, Ordering::Relaxed);
            info!("Chain extended, new height {block_height}");
        } else {
            info!("Chain extended but height is same, height {}", chain.height);
        }

        // New tip set: drop the tips this block consumed, add the block, and
        // discard anything lagging the chain by two or more heights
        let chain_height = chain.height;
        let mut new_tips: BlockHashSet =
            chain.tips.iter().copied().filter(|tip| !cbl.block.tips.contains(tip)).collect();
        new_tips.insert(block_hash);
        new_tips.retain(|tip| {
            let tip_height = self.block_store.get_height(*tip).unwrap_or(0);
            if chain_height.saturating_sub(tip_height) < 2 {
                true
            } else {
                info!("Rusty TIP declared stale: {tip}, best height {chain_height}, tip height {tip_height}");
                false
            }
        });
        chain.tips = new_tips;

        // A recent-enough block means we caught up and can verify in full again
        if !self.synced.load(Ordering::Relaxed) && cbl.block.timestamp + SYNC_HORIZON_MS > unix_now() {
            info!("chain is caught up, resuming full verification");
            self.synced.store(true, Ordering::Relaxed);
        }

        // Pool and mini-block housekeeping must never take the chain down
        if catch_unwind(AssertUnwindSafe(|| self.housekeeping(&cbl, block_height))).is_err() {
            error!("housekeeping triggered panic at height {block_height}");
        }

        self.counters.blocks_accepted.fetch_add(1, Ordering::Relaxed);
        self.counters.block_body_bytes.fetch_add(cbl.transactions_size(), Ordering::Relaxed);
        debug!("Block {block_hash} accepted in {:?}", processing_start.elapsed());

        drop(chain);

        // Receivers observe at least the state committed above
        self.notify_new_block.notify_all();
        if height_changed {
            self.notify_height_changed.notify_all();
        }
        Ok(())
    }

    fn housekeeping(&self, cbl: &CompleteBlock, block_height: u64) {
        let purged = self.mini_blocks.purge_below(self.get_stable_height());
        if purged > 0 {
            debug!("purged {purged} mini blocks");
        }

        // Discard the block's transactions from the pools
        for tx in cbl.transactions.iter() {
            let txid = tx.id();
            match tx.tx_type {
                TransactionType::Registration => {
                    if self.regpool.contains(txid) {
                        debug!("deleting tx {txid} from regpool");
                        self.regpool.delete(txid);
                    }
                }
                TransactionType::Normal | TransactionType::Burn | TransactionType::Sc => {
                    if self.mempool.contains(txid) {
                        debug!("deleting tx {txid} from mempool");
                        self.mempool.delete(txid);
                    }
                }
                _ => {}
            }
        }

        self.mempool.housekeeping(block_height);

        // Let the regpool drop registrations that are already on chain; the
        // rest get another chance
        if let Ok(snapshot) = self.state_store.load_snapshot(0) {
            if let Ok(balance_tree) = snapshot.get_tree(store_names::BALANCE_TREE) {
                self.regpool.housekeeping(block_height, &|tx: &Transaction| {
                    !tx.is_registration() || balance_tree.contains(tx.miner_address.as_ref())
                });
            }
        }
    }

    /// This is the only entrypoint for new transactions: verifies everything
    /// possible without touching the DB and routes into the matching pool.
    pub fn add_transaction_to_pool(&self, tx: Transaction) -> TxResult<()> {
        if tx.is_premine() {
            return Err(TxRuleError::NotMineable);
        }

        let chain = self.chain.read();
        let chain_height = chain.height;
        let hf_version = self.config.version_at_height(chain_height);

        if tx.is_registration() {
            // Route to the regpool only when the address is still unregistered
            let snapshot = self.state_store.load_snapshot(0).map_err(|_| TxRuleError::PoolRejected)?;
            let balance_tree = snapshot.get_tree(store_names::BALANCE_TREE).map_err(|_| TxRuleError::PoolRejected)?;
            if balance_tree.contains(tx.miner_address.as_ref()) {
                return Err(TxRuleError::AlreadyRegistered);
            }
            self.transaction_validator.verify_transaction(&tx, hf_version)?;
            return if self.regpool.add(Arc::new(tx), chain_height) { Ok(()) } else { Err(TxRuleError::RegistrationPending) };
        }

        if !tx.is_mineable() {
            return Err(TxRuleError::NotMineable);
        }

        let txid = tx.id();
        if self.mempool.contains(txid) {
            return Err(TxRuleError::DuplicateInPool);
        }
        if self.tx_store.has(txid).unwrap_or(false) {
            return Err(TxRuleError::AlreadyMined);
        }

        let size = tx.serialized_size();
        if size > self.config.max_tx_size {
            return Err(TxRuleError::TooBig(txid, size, self.config.max_tx_size));
        }

        let calculated_fee = self.transaction_validator.calculate_tx_fee(hf_version, size);
        let provided_fee = tx.fees();
        if calculated_fee > provided_fee {
            return Err(TxRuleError::FeeTooLow(provided_fee, calculated_fee));
        }

        let tips: Vec<Hash> = chain.tips.iter().copied().collect();
        self.transaction_validator.verify_nonce_against_tips(&tx, &tips, hf_version).inspect_err(|err| {
            debug!("incoming tx {txid} nonce verification failed: {err}");
        })?;
        self.transaction_validator.verify_transaction(&tx, hf_version).inspect_err(|err| {
            debug!("incoming tx {txid} could not be verified: {err}");
        })?;

        if self.mempool.add(Arc::new(tx), chain_height) {
            Ok(())
        } else {
            Err(TxRuleError::PoolRejected)
        }
    }

    /// Feeds a mined mini block into the collection; broadcasts when it is new
    pub fn add_mini_block(&self, mini_block: MiniBlock) -> bool {
        let is_new = self.mini_blocks.insert(mini_block);
        if is_new {
            self.notify_new_mini_block.notify_all();
        }
        is_new
    }

    /// Rewinds at least `rewind_count` topological slots, extending the rewind
    /// until the slot below the new top is a safe anchor (genesis, height 1 or
    /// a sync block). The in-memory chain is then reloaded from disk.
    pub fn rewind_chain(&self, rewind_count: u64) -> bool {
        let mut chain = self.chain.write();

        if rewind_count == 0 {
            return false;
        }
        let count = self.topo_store.count();
        if count == 0 {
            return false;
        }
        let top_slot = count - 1;
        let chain_height = chain.height;

        let mut rewinded = 0;
        while top_slot - rewinded >= 1 && rewinded < rewind_count {
            rewinded += 1;
        }

        // Extend until we sit on an anchor
        loop {
            let record = self
                .topo_store
                .read(top_slot - rewinded)
                .unwrap_or_else(|err| panic!("cannot read the topological record while rewinding: {err}"));
            if record.height == 1 || self.is_sync_block_at_height(record.block_id, chain_height) {
                break;
            }
            if rewinded == top_slot {
                break; // Nothing left above genesis
            }
            rewinded += 1;
        }

        for i in 0..rewinded {
            self.topo_store
                .clean(top_slot - i)
                .unwrap_or_else(|err| panic!("cannot clean the topological record while rewinding: {err}"));
        }

        self.reload_chain_inner(&mut chain);
        true
    }

    /// Reads the chain state back from disk; callable at any point in time
    pub fn init_chain_from_db(&self) {
        let mut chain = self.chain.write();
        self.reload_chain_inner(&mut chain);
    }

    fn reload_chain_inner(&self, chain: &mut ChainInner) {
        match self.topo_store.top() {
            Some(top) => {
                chain.height = top.height;
                chain.top_id = top.block_id;
                // We only can load a single tip from disk
                chain.tips = BlockHashSet::from_iter([top.block_id]);
            }
            None => {
                chain.height = 0;
                chain.top_id = Hash::default();
                chain.tips = BlockHashSet::new();
            }
        }
        self.height_mirror.store(chain.height, Ordering::Relaxed);
        info!("Reloaded chain from disk: height {} top {}", chain.height, chain.top_id);
    }

    /// Takes the chain down: closes the exit event, shuts the pools and joins
    /// the monitor
    pub fn shutdown(&self) {
        {
            let _guard = self.chain.write();
            self.exit_sender.lock().take(); // Dropping the sender closes the exit channel
            self.mempool.shutdown();
            self.regpool.shutdown();
            info!("Stopping blockchain");
        }
        if let Some(handle) = self.monitor_handle.lock().take() {
            let _ = handle.join();
        }
    }

    // ---- Queries ----

    pub fn get_height(&self) -> u64 {
        self.height_mirror.load(Ordering::Relaxed)
    }

    pub fn get_stable_height(&self) -> u64 {
        self.get_height().saturating_sub(self.config.stable_limit)
    }

    pub fn get_tips(&self) -> Vec<Hash> {
        self.chain.read().tips.iter().copied().collect()
    }

    pub fn get_top_id(&self) -> Hash {
        self.chain.read().top_id
    }

    pub fn get_difficulty(&self) -> u64 {
        self.difficulty_manager.difficulty_at_tips(&self.get_tips())
    }

    pub fn integrator_address(&self) -> AccountKey {
        self.config.integrator_address()
    }

    pub fn get_current_version_at_height(&self, height: u64) -> ForkVersion {
        self.config.version_at_height(height)
    }

    pub fn block_exists(&self, hash: Hash) -> bool {
        self.block_store.block_exists(hash)
    }

    pub fn get_block(&self, hash: Hash) -> Option<Arc<Block>> {
        self.block_store.get(hash).unwrap_option()
    }

    pub fn get_block_height(&self, hash: Hash) -> Option<u64> {
        self.block_store.get_height(hash)
    }

    pub fn get_topo_record(&self, slot: u64) -> Option<TopoRecord> {
        self.topo_store.read(slot).unwrap_option()
    }

    pub fn get_topo_count(&self) -> u64 {
        self.topo_store.count()
    }

    pub fn is_block_topological_order(&self, hash: Hash) -> bool {
        self.topo_store.is_block_ordered(hash)
    }

    /// A block with no topological order is orphaned or stale
    pub fn is_block_orphan(&self, hash: Hash) -> bool {
        !self.is_block_topological_order(hash)
    }

    pub fn get_blocks_at_height(&self, height: u64) -> Vec<Hash> {
        self.topo_store.binary_search_height(height).unwrap_or_default()
    }

    /// Side blocks lost the race to a peer at the same height: they thicken
    /// the chain but contribute no rewards and no transaction effects
    pub fn is_side_block(&self, hash: Hash) -> bool {
        match self.topo_store.block_slot(hash) {
            Some(0) | None => false,
            Some(slot) => {
                let height = self.topo_store.read(slot).map(|record| record.height).unwrap_or(0);
                self.executor.is_side_block_internal(slot, height)
            }
        }
    }

    /// Sync blocks settle the chain: the sole block at a height that has sunk
    /// below the stable limit, and hence a safe rewind anchor
    pub fn is_sync_block(&self, hash: Hash) -> bool {
        self.is_sync_block_at_height(hash, self.get_height())
    }

    fn is_sync_block_at_height(&self, hash: Hash, chain_height: u64) -> bool {
        let Some(height) = self.block_store.get_height(hash) else {
            return false;
        };
        if height == 0 {
            return true; // Genesis is always a sync block
        }
        // Top blocks are always considered unstable
        if height + self.config.stable_limit > chain_height {
            return false;
        }
        if !self.is_block_topological_order(hash) {
            return false;
        }
        self.get_blocks_at_height(height).len() == 1
    }

    /// Reports where a mined transaction became effective. A tx is valid when
    /// some non-side block within its validity window carries it.
    pub fn is_tx_valid(&self, txid: TransactionId) -> TxValidity {
        let mut validity = TxValidity::default();
        let Some(tx) = self.tx_store.get(txid).unwrap_option() else {
            return validity;
        };

        let mut candidates: Vec<Hash> = Vec::new();
        for height_offset in 1..2 * self.config.tx_validity_height {
            candidates.extend(self.get_blocks_at_height(tx.height + height_offset));
        }

        for blid in candidates {
            let Some(block) = self.get_block(blid) else {
                return validity;
            };
            if !block.tx_hashes.contains(&txid) {
                continue;
            }
            if self.is_side_block(blid) {
                validity.invalid_in.push(blid);
            } else {
                validity.valid_in = Some(blid);
            }
        }
        validity
    }

    /// A tx mined only by side blocks is orphaned
    pub fn is_tx_orphan(&self, txid: TransactionId) -> bool {
        !self.is_tx_valid(txid).is_valid()
    }

    /// Checksum over the full serialized block and its transactions, used by
    /// fast sync to skip re-verification of dev-attested block ranges
    pub fn block_checksum(&self, cbl: &CompleteBlock) -> Hash {
        let mut hasher = ContentHasher::new();
        hasher.update(bincode::serialize(cbl.block.as_ref()).expect("serde serialization of a block cannot fail"));
        for tx in cbl.transactions.iter() {
            hasher.update(bincode::serialize(tx).expect("serde serialization of a transaction cannot fail"));
        }
        hasher.finalize()
    }

    /// Builds a mining template over the current best tips. The template comes
    /// without mini blocks; miners attach their own before submission.
    pub fn generate_block_template(&self, miner_address: AccountKey) -> CompleteBlock {
        let chain = self.chain.read();
        let mut tips: Vec<Hash> = chain.tips.iter().copied().collect();
        drop(chain);

        // Deterministic preference: higher first, hash as tiebreak, two at most
        tips.sort_by_key(|tip| (std::cmp::Reverse(self.block_store.get_height(*tip).unwrap_or(0)), *tip));
        tips.truncate(2);
        // Both tips must resolve to the same height for the shape rule
        if tips.len() == 2 && self.block_store.get_height(tips[0]) != self.block_store.get_height(tips[1]) {
            tips.truncate(1);
        }

        let height = self.dag.height_at_tips(&tips).expect("tips are stored blocks");
        let parent_ts = tips.iter().filter_map(|tip| self.block_store.get_timestamp(*tip)).max().unwrap_or(0);
        let timestamp = parent_ts.max(unix_now());

        let miner_tx = Transaction {
            version: 1,
            tx_type: TransactionType::Coinbase,
            height,
            miner_address,
            allocations: vec![],
            payloads: vec![],
        };
        let template = CompleteBlock::from_block(Block {
            major_version: self.config.version_at_height(height),
            height,
            timestamp,
            tips,
            mini_blocks: vec![],
            miner_tx,
            tx_hashes: vec![],
        });
        self.mining_blocks_cache.lock().put(template.hash(), template.clone());
        template
    }

    /// A template previously handed to a miner, if still cached
    pub fn get_mining_block(&self, hash: Hash) -> Option<CompleteBlock> {
        self.mining_blocks_cache.lock().get(&hash).cloned()
    }

    /// Whether the account is registered in the latest committed balance tree
    pub fn is_address_registered(&self, account: AccountKey) -> bool {
        self.validator.is_address_registered(account)
    }

    /// The account's balance in the latest committed snapshot
    pub fn get_balance(&self, account: AccountKey) -> Option<u64> {
        self.get_balance_at_version(account, 0)
    }

    /// The account's balance as of the given state version (0 aliases latest)
    pub fn get_balance_at_version(&self, account: AccountKey, version: u64) -> Option<u64> {
        let snapshot = self.state_store.load_snapshot(version).ok()?;
        let tree = snapshot.get_tree(store_names::BALANCE_TREE).ok()?;
        let bytes = tree.get(account.as_ref())?;
        let record: vertex_consensus_core::account::AccountRecord = bincode::deserialize(bytes).ok()?;
        Some(record.balance)
    }

    /// The authenticated root of the balance tree at a state version, used by
    /// sync and by determinism checks
    pub fn balance_tree_hash_at(&self, version: u64) -> Option<Hash> {
        let snapshot = self.state_store.load_snapshot(version).ok()?;
        snapshot.get_tree(store_names::BALANCE_TREE).ok().map(|tree| tree.hash())
    }
}
