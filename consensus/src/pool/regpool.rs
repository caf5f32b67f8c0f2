use log::debug;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use vertex_consensus_core::{
    pool::RegpoolStore,
    tx::{Transaction, TransactionId},
};

/// Reference in-memory registration pool. Unlike the mempool, entries are kept
/// until the housekeeping predicate decides they are no longer worth retrying
/// (usually because the address got registered through another path).
pub struct Regpool {
    entries: RwLock<HashMap<TransactionId, Arc<Transaction>>>,
}

impl Regpool {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

impl Default for Regpool {
    fn default() -> Self {
        Self::new()
    }
}

impl RegpoolStore for Regpool {
    fn contains(&self, txid: TransactionId) -> bool {
        self.entries.read().contains_key(&txid)
    }

    fn add(&self, tx: Arc<Transaction>, _height: u64) -> bool {
        let mut entries = self.entries.write();
        // One pending registration per address
        if entries.values().any(|pending| pending.miner_address == tx.miner_address) {
            return false;
        }
        entries.insert(tx.id(), tx).is_none()
    }

    fn delete(&self, txid: TransactionId) -> bool {
        self.entries.write().remove(&txid).is_some()
    }

    fn housekeeping(&self, height: u64, discard: &dyn Fn(&Transaction) -> bool) {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, tx| !discard(tx));
        let dropped = before - entries.len();
        if dropped > 0 {
            debug!("regpool housekeeping dropped {dropped} registrations at height {height}");
        }
    }

    fn shutdown(&self) {
        debug!("regpool shutting down with {} pending registrations", self.entries.read().len());
    }
}
