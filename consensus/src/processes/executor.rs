use crate::{
    constants::{store_names, SC_BALANCE_KEY, SC_CODE_KEY},
    model::stores::{
        block_store::{BlockStoreReader, DbBlockStore},
        topo_index::{DbTopoStore, TopoRecord},
        transactions::DbTransactionsStore,
    },
};
use log::{debug, info};
use std::{collections::BTreeMap, sync::Arc};
use vertex_consensus_core::{
    account::{sc_meta_key, sc_tree_name, AccountRecord, ScMetaRecord},
    block::Block,
    counters::ProcessingCounters,
    tx::{ScOp, Transaction, TransactionType},
};
use vertex_hashes::{hash_of, Hash};
use vertex_statestore::{Snapshot, StateStore, Tree};

/// The built-in name-service contract, installed by the genesis slot
const NAME_SERVICE_SCID: Hash = Hash::from_bytes([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
]);
const NAME_SERVICE_CODE: &[u8] = b"builtin/nameservice/1";

/// Execution environment handed to contract processing for a slot
struct ScEnv {
    height: u64,
    topo_slot: u64,
    block_time: u64,
    block_hash: Hash,
}

/// Replays topological slots against the versioned state trees. This is the
/// client protocol: per slot it applies every transaction, refreshes contract
/// roots, credits the miner and commits all touched trees atomically.
///
/// Storage failures in here are fatal by policy. A partial commit would leave
/// the state diverged from what future blocks chained against, so every error
/// path panics into the process abort hook instead of attempting recovery.
pub struct Executor {
    block_store: Arc<DbBlockStore>,
    tx_store: Arc<DbTransactionsStore>,
    topo_store: Arc<DbTopoStore>,
    state_store: StateStore,
    base_reward: u64,
    counters: Arc<ProcessingCounters>,
}

impl Executor {
    pub fn new(
        block_store: Arc<DbBlockStore>,
        tx_store: Arc<DbTransactionsStore>,
        topo_store: Arc<DbTopoStore>,
        state_store: StateStore,
        base_reward: u64,
        counters: Arc<ProcessingCounters>,
    ) -> Self {
        Self { block_store, tx_store, topo_store, state_store, base_reward, counters }
    }

    /// Executes the linearized order starting at `base_topo_index`, rewriting
    /// one topological record per slot. Slots whose record already holds the
    /// same block are left untouched.
    pub fn execute_order(&self, order: &[Hash], base_topo_index: u64) {
        for (i, block_hash) in order.iter().copied().enumerate() {
            let current_topo_block = base_topo_index + i as u64;
            debug!("will execute order i={i} blid={block_hash} slot={current_topo_block}");

            if self.topo_store.block_slot(block_hash) == Some(current_topo_block) {
                continue; // The slot survived the reorg unchanged
            }

            let block = self
                .block_store
                .get(block_hash)
                .unwrap_or_else(|err| panic!("cannot load block {block_hash} for the client protocol: {err}"));

            let record_version = if current_topo_block == 0 {
                0
            } else {
                self.topo_store
                    .read(current_topo_block - 1)
                    .unwrap_or_else(|err| panic!("cannot load the previous topological record: {err}"))
                    .state_version
            };

            let snapshot = self
                .state_store
                .load_snapshot(record_version)
                .unwrap_or_else(|err| panic!("cannot load state snapshot {record_version}: {err}"));
            let mut balance_tree = snapshot
                .get_tree(store_names::BALANCE_TREE)
                .unwrap_or_else(|err| panic!("cannot load the balance tree: {err}"));
            let mut sc_meta =
                snapshot.get_tree(store_names::SC_META).unwrap_or_else(|err| panic!("cannot load the sc meta tree: {err}"));

            let mut data_trees: Vec<Tree> = Vec::new();

            if !self.is_side_block_internal(current_topo_block, block.height) {
                // Change cache for every contract tree this block touches
                let mut sc_change_cache: BTreeMap<Hash, Tree> = BTreeMap::new();
                self.install_hardcoded_contracts(&mut sc_change_cache, &snapshot, &mut sc_meta, block.height);

                let mut fees_collected = 0u64;
                for txhash in &block.tx_hashes {
                    let tx = self
                        .tx_store
                        .get(*txhash)
                        .unwrap_or_else(|err| panic!("cannot load tx {txhash} for the client protocol: {err}"));
                    for payload in &tx.payloads {
                        // Only deployed contracts enter the change cache; a payload
                        // referencing an unknown SCID has no tree to affect
                        if !payload.scid.is_zero()
                            && !sc_change_cache.contains_key(&payload.scid)
                            && sc_meta.contains(&sc_meta_key(payload.scid))
                        {
                            let tree = snapshot
                                .get_tree(&sc_tree_name(payload.scid))
                                .unwrap_or_else(|err| panic!("cannot load contract tree {}: {err}", payload.scid));
                            sc_change_cache.insert(payload.scid, tree);
                        }
                    }

                    fees_collected += self.process_transaction(&tx, &mut balance_tree, block.height);
                    if tx.tx_type == TransactionType::Sc {
                        let env = ScEnv {
                            height: block.height,
                            topo_slot: current_topo_block,
                            block_time: block.timestamp / 1000,
                            block_hash,
                        };
                        fees_collected +=
                            self.process_transaction_sc(&mut sc_change_cache, &snapshot, &tx, &env, &mut balance_tree, &mut sc_meta);
                    }
                    self.counters.txs_committed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                }

                // Rehash every touched contract tree and interlink it through its
                // meta record before anything is committed
                for (scid, tree) in sc_change_cache {
                    let meta_bytes = sc_meta
                        .get(&sc_meta_key(scid))
                        .unwrap_or_else(|| panic!("contract {scid} has no meta record"))
                        .to_vec();
                    let mut meta: ScMetaRecord =
                        bincode::deserialize(&meta_bytes).unwrap_or_else(|err| panic!("corrupt meta record for {scid}: {err}"));
                    meta.data_hash = tree.hash();
                    sc_meta.put(
                        sc_meta_key(scid).to_vec(),
                        bincode::serialize(&meta).expect("serde serialization of a meta record cannot fail"),
                    );
                    data_trees.push(tree);
                }

                self.process_miner_transaction(&block, block.height == 0, &mut balance_tree, fees_collected);
            } else {
                info!("this block is a side block: height {} blid {}", block.height, block_hash);
                self.counters.side_blocks.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }

            // Side blocks commit too: downstream slots chain on a fresh version
            data_trees.push(balance_tree);
            data_trees.push(sc_meta);

            let commit_version =
                self.state_store.commit(data_trees).unwrap_or_else(|err| panic!("state commit failed, cannot continue: {err}"));

            self.topo_store
                .write(current_topo_block, TopoRecord { block_id: block_hash, state_version: commit_version, height: block.height })
                .unwrap_or_else(|err| panic!("cannot write the topological record: {err}"));
            self.counters.slots_executed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    /// A block is a side block when the record right below it already sits at
    /// its height: it lost the race and must not affect state.
    pub fn is_side_block_internal(&self, topo_slot: u64, block_height: u64) -> bool {
        if topo_slot == 0 {
            return false; // Genesis cannot be a side block
        }
        let record = self
            .topo_store
            .read(topo_slot - 1)
            .unwrap_or_else(|err| panic!("could not load block from previous order: {err}"));
        record.height == block_height
    }

    /// Applies a single transaction to the balance tree, returning its fees
    fn process_transaction(&self, tx: &Transaction, balance_tree: &mut Tree, block_height: u64) -> u64 {
        match tx.tx_type {
            TransactionType::Registration => {
                if !balance_tree.contains(tx.miner_address.as_ref()) {
                    put_account(balance_tree, tx.miner_address, AccountRecord { balance: 0, registered_height: block_height });
                }
                0
            }
            TransactionType::Normal | TransactionType::Burn | TransactionType::Sc => {
                let mut fees = 0u64;
                for payload in &tx.payloads {
                    let debit = payload.amount + payload.burn + payload.fee;
                    if let Some(mut source) = get_account(balance_tree, payload.source) {
                        source.balance = source.balance.saturating_sub(debit);
                        put_account(balance_tree, payload.source, source);
                    }
                    // Credits only reach registered destinations; the rest of the
                    // moved value is burned by construction
                    if payload.scid.is_zero() {
                        if let Some(mut destination) = get_account(balance_tree, payload.destination) {
                            destination.balance += payload.amount;
                            put_account(balance_tree, payload.destination, destination);
                        }
                    }
                    fees += payload.fee;
                }
                fees
            }
            // Premine and coinbase are handled by process_miner_transaction
            TransactionType::Premine | TransactionType::Coinbase => 0,
        }
    }

    /// Applies the contract side of an SC transaction: deployments, data-tree
    /// writes and deposits. Returns the gas fees collected.
    fn process_transaction_sc(
        &self,
        sc_change_cache: &mut BTreeMap<Hash, Tree>,
        snapshot: &Snapshot,
        tx: &Transaction,
        env: &ScEnv,
        balance_tree: &mut Tree,
        sc_meta: &mut Tree,
    ) -> u64 {
        for payload in &tx.payloads {
            for op in &payload.sc_ops {
                match op {
                    ScOp::Install { code } => {
                        let scid = tx.id();
                        let tree = sc_change_cache.entry(scid).or_insert_with(|| {
                            snapshot
                                .get_tree(&sc_tree_name(scid))
                                .unwrap_or_else(|err| panic!("cannot open the data tree of new contract {scid}: {err}"))
                        });
                        tree.put(SC_CODE_KEY.to_vec(), code.clone());
                        write_env(tree, env);
                        sc_meta.put(
                            sc_meta_key(scid).to_vec(),
                            bincode::serialize(&ScMetaRecord { data_hash: Hash::default(), code_hash: hash_of(code) })
                                .expect("serde serialization of a meta record cannot fail"),
                        );
                    }
                    ScOp::Store { key, value } => {
                        if let Some(tree) = sc_change_cache.get_mut(&payload.scid) {
                            tree.put(key.clone(), value.clone());
                            write_env(tree, env);
                        }
                    }
                    ScOp::Delete { key } => {
                        if let Some(tree) = sc_change_cache.get_mut(&payload.scid) {
                            tree.delete(key);
                            write_env(tree, env);
                        }
                    }
                    ScOp::Deposit { amount } => {
                        if let Some(tree) = sc_change_cache.get_mut(&payload.scid) {
                            if let Some(mut source) = get_account(balance_tree, payload.source) {
                                source.balance = source.balance.saturating_sub(*amount);
                                put_account(balance_tree, payload.source, source);
                            }
                            let held = tree.get(SC_BALANCE_KEY).map(read_u64).unwrap_or(0);
                            tree.put(SC_BALANCE_KEY.to_vec(), (held + amount).to_le_bytes().to_vec());
                            write_env(tree, env);
                        }
                    }
                }
            }
        }
        // TODO: charge gas once SC metering lands; deployments ride on tx fees for now
        0
    }

    /// Deterministic contract installs at fixed heights
    fn install_hardcoded_contracts(
        &self,
        sc_change_cache: &mut BTreeMap<Hash, Tree>,
        snapshot: &Snapshot,
        sc_meta: &mut Tree,
        block_height: u64,
    ) {
        if block_height != 0 {
            return;
        }
        let mut tree = snapshot
            .get_tree(&sc_tree_name(NAME_SERVICE_SCID))
            .unwrap_or_else(|err| panic!("cannot open the name service tree: {err}"));
        tree.put(SC_CODE_KEY.to_vec(), NAME_SERVICE_CODE.to_vec());
        sc_meta.put(
            sc_meta_key(NAME_SERVICE_SCID).to_vec(),
            bincode::serialize(&ScMetaRecord { data_hash: Hash::default(), code_hash: hash_of(NAME_SERVICE_CODE) })
                .expect("serde serialization of a meta record cannot fail"),
        );
        sc_change_cache.insert(NAME_SERVICE_SCID, tree);
    }

    /// Credits the miner: the premine allocations at genesis, the base reward
    /// plus collected fees everywhere else
    fn process_miner_transaction(&self, block: &Block, is_genesis: bool, balance_tree: &mut Tree, fees_collected: u64) {
        if is_genesis {
            for allocation in &block.miner_tx.allocations {
                put_account(
                    balance_tree,
                    allocation.account,
                    AccountRecord { balance: allocation.amount, registered_height: 0 },
                );
            }
            return;
        }
        let miner = block.miner_tx.miner_address;
        let mut record = get_account(balance_tree, miner)
            .unwrap_or_else(|| panic!("coinbase account {miner} is not registered, the validator must prevent this"));
        record.balance += self.base_reward + fees_collected;
        put_account(balance_tree, miner, record);
    }
}

fn get_account(balance_tree: &Tree, key: Hash) -> Option<AccountRecord> {
    balance_tree
        .get(key.as_ref())
        .map(|bytes| bincode::deserialize(bytes).unwrap_or_else(|err| panic!("corrupt balance record for {key}: {err}")))
}

fn put_account(balance_tree: &mut Tree, key: Hash, record: AccountRecord) {
    balance_tree.put(
        key.as_ref().to_vec(),
        bincode::serialize(&record).expect("serde serialization of a balance record cannot fail"),
    );
}

fn read_u64(bytes: &[u8]) -> u64 {
    u64::from_le_bytes(bytes.try_into().unwrap_or_else(|_| panic!("corrupt contract balance entry")))
}

/// Records the latest invocation environment under the contract's reserved key,
/// making slot, time and block id observable to contract state
fn write_env(tree: &mut Tree, env: &ScEnv) {
    let mut bytes = Vec::with_capacity(8 * 3 + 32);
    bytes.extend_from_slice(&env.height.to_le_bytes());
    bytes.extend_from_slice(&env.topo_slot.to_le_bytes());
    bytes.extend_from_slice(&env.block_time.to_le_bytes());
    bytes.extend_from_slice(env.block_hash.as_ref());
    tree.put(b"E".to_vec(), bytes);
}
