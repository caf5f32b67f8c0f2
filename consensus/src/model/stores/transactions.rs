use std::sync::Arc;
use vertex_consensus_core::tx::{Transaction, TransactionId};
use vertex_database::prelude::{CachedDbAccess, DbWriter, StoreResult, DB};

const STORE_PREFIX: &[u8] = b"transactions";

/// Transaction payloads keyed by txid. A tx is written once, when the first
/// block carrying it is accepted, and is never rewritten.
#[derive(Clone)]
pub struct DbTransactionsStore {
    access: CachedDbAccess<TransactionId, Arc<Transaction>>,
}

impl DbTransactionsStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self { access: CachedDbAccess::new(db, cache_size, STORE_PREFIX) }
    }

    pub fn insert(&self, writer: impl DbWriter, id: TransactionId, tx: Arc<Transaction>) -> StoreResult<()> {
        self.access.write(writer, id, tx)
    }

    pub fn has(&self, id: TransactionId) -> StoreResult<bool> {
        self.access.has(id)
    }

    pub fn get(&self, id: TransactionId) -> StoreResult<Arc<Transaction>> {
        self.access.read(id)
    }
}
