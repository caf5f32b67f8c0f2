use log::{debug, info};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use vertex_consensus_core::{
    pool::MempoolStore,
    tx::{Transaction, TransactionId},
};

struct PoolEntry {
    tx: Arc<Transaction>,
    added_height: u64,
}

/// Reference in-memory mempool. Entries expire once the chain has progressed
/// past their nonce validity window, since they can never be mined again.
pub struct Mempool {
    entries: RwLock<HashMap<TransactionId, PoolEntry>>,
    expiry_heights: u64,
}

impl Mempool {
    pub fn new(expiry_heights: u64) -> Self {
        Self { entries: RwLock::new(HashMap::new()), expiry_heights }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl MempoolStore for Mempool {
    fn contains(&self, txid: TransactionId) -> bool {
        self.entries.read().contains_key(&txid)
    }

    fn add(&self, tx: Arc<Transaction>, height: u64) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&tx.id()) {
            return false;
        }
        entries.insert(tx.id(), PoolEntry { tx, added_height: height });
        true
    }

    fn delete(&self, txid: TransactionId) -> bool {
        self.entries.write().remove(&txid).is_some()
    }

    fn housekeeping(&self, height: u64) {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.added_height + self.expiry_heights > height || entry.tx.height + self.expiry_heights > height);
        let expired = before - entries.len();
        if expired > 0 {
            debug!("mempool housekeeping expired {expired} txs at height {height}");
        }
    }

    fn shutdown(&self) {
        info!("mempool shutting down with {} pending txs", self.entries.read().len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vertex_consensus_core::tx::TransactionType;

    fn tx(height: u64, nonce: u64) -> Arc<Transaction> {
        Arc::new(Transaction {
            version: 1,
            tx_type: TransactionType::Normal,
            height,
            miner_address: nonce.into(),
            allocations: vec![],
            payloads: vec![],
        })
    }

    #[test]
    fn test_add_contains_expire() {
        let pool = Mempool::new(10);
        let t = tx(5, 1);
        assert!(pool.add(t.clone(), 5));
        assert!(!pool.add(t.clone(), 5));
        assert!(pool.contains(t.id()));

        pool.housekeeping(14);
        assert!(pool.contains(t.id()));
        pool.housekeeping(30);
        assert!(!pool.contains(t.id()));
    }
}
