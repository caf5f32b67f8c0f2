use crate::tx::{Transaction, TransactionId};
use std::sync::Arc;

/// Interface of the normal transaction pool as seen by the consensus engine.
/// The engine never iterates a pool; it only checks existence, inserts
/// verified transactions and triggers housekeeping after accepted blocks.
pub trait MempoolStore: Send + Sync {
    fn contains(&self, txid: TransactionId) -> bool;
    /// Inserts the transaction, tagged with the chain height at insertion time.
    /// Returns false if the pool refused it (duplicate, full, ...).
    fn add(&self, tx: Arc<Transaction>, height: u64) -> bool;
    fn delete(&self, txid: TransactionId) -> bool;
    /// Gives the pool an opportunity to expire stale entries
    fn housekeeping(&self, height: u64);
    fn shutdown(&self);
}

/// Interface of the registration pool. Registrations queue separately because
/// their admission depends on the live balance tree rather than on proofs.
pub trait RegpoolStore: Send + Sync {
    fn contains(&self, txid: TransactionId) -> bool;
    fn add(&self, tx: Arc<Transaction>, height: u64) -> bool;
    fn delete(&self, txid: TransactionId) -> bool;
    /// Expires entries for which `discard` returns true
    fn housekeeping(&self, height: u64, discard: &dyn Fn(&Transaction) -> bool);
    fn shutdown(&self);
}
