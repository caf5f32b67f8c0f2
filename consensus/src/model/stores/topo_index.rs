use parking_lot::Mutex;
use rocksdb::WriteBatch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vertex_database::prelude::{BatchDbWriter, CachedDbAccess, CachedDbItem, StoreResult, StoreResultExtensions, DB};
use vertex_hashes::Hash;

const RECORDS_PREFIX: &[u8] = b"topo-records";
const SLOTS_PREFIX: &[u8] = b"topo-slots";
const COUNT_KEY: &[u8] = b"topo-count";

/// The record occupying a topological slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopoRecord {
    pub block_id: Hash,
    pub state_version: u64,
    pub height: u64,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct SlotKey([u8; 8]);

impl From<u64> for SlotKey {
    fn from(slot: u64) -> Self {
        Self(slot.to_be_bytes())
    }
}

impl AsRef<[u8]> for SlotKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The append-only array of topological records, with a reverse block-id to
/// slot column. A reorg rewrites slots above the divergence point, which can
/// leave stale reverse entries behind; readers must therefore confirm a reverse
/// lookup against the record it points at (see [`DbTopoStore::block_slot`]).
#[derive(Clone)]
pub struct DbTopoStore {
    db: Arc<DB>,
    records: CachedDbAccess<SlotKey, TopoRecord>,
    block_slots: CachedDbAccess<Hash, u64>,
    count: Arc<Mutex<CachedDbItem<u64>>>,
}

impl DbTopoStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self {
            db: db.clone(),
            records: CachedDbAccess::new(db.clone(), cache_size, RECORDS_PREFIX),
            block_slots: CachedDbAccess::new(db.clone(), cache_size, SLOTS_PREFIX),
            count: Arc::new(Mutex::new(CachedDbItem::new(db, COUNT_KEY))),
        }
    }

    /// Number of assigned slots (the next slot to be written)
    pub fn count(&self) -> u64 {
        self.count.lock().read().unwrap_option().unwrap_or(0)
    }

    pub fn read(&self, slot: u64) -> StoreResult<TopoRecord> {
        self.records.read(slot.into())
    }

    /// The record of the highest assigned slot
    pub fn top(&self) -> Option<TopoRecord> {
        let count = self.count();
        if count == 0 {
            return None;
        }
        self.read(count - 1).unwrap_option()
    }

    /// Atomically (re)assigns a slot
    pub fn write(&self, slot: u64, record: TopoRecord) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        self.records.write(BatchDbWriter::new(&mut batch), slot.into(), record)?;
        self.block_slots.write(BatchDbWriter::new(&mut batch), record.block_id, slot)?;
        let mut count = self.count.lock();
        let current = count.read().unwrap_option().unwrap_or(0);
        if slot + 1 > current {
            count.write(BatchDbWriter::new(&mut batch), &(slot + 1))?;
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// Removes the record at `slot`. Rewind cleans slots from the top down, so
    /// the slot count shrinks to the cleaned slot.
    pub fn clean(&self, slot: u64) -> StoreResult<()> {
        let mut batch = WriteBatch::default();
        if let Some(record) = self.records.read(slot.into()).unwrap_option() {
            self.records.delete(BatchDbWriter::new(&mut batch), slot.into())?;
            self.block_slots.delete(BatchDbWriter::new(&mut batch), record.block_id)?;
        }
        let mut count = self.count.lock();
        let current = count.read().unwrap_option().unwrap_or(0);
        if slot < current {
            count.write(BatchDbWriter::new(&mut batch), &slot)?;
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// The slot currently holding `block_id`, confirmed against the record
    /// (reverse entries may be stale after a reorg)
    pub fn block_slot(&self, block_id: Hash) -> Option<u64> {
        let slot = self.block_slots.read(block_id).unwrap_option()?;
        match self.read(slot).unwrap_option() {
            Some(record) if record.block_id == block_id => Some(slot),
            _ => None,
        }
    }

    pub fn is_block_ordered(&self, block_id: Hash) -> bool {
        self.block_slot(block_id).is_some()
    }

    /// All block ids ordered at exactly `height`. Heights along the topological
    /// order are non-decreasing, so a binary search locates the run.
    pub fn binary_search_height(&self, height: u64) -> StoreResult<Vec<Hash>> {
        let count = self.count();
        let (mut lo, mut hi) = (0u64, count);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.read(mid)?.height < height {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let mut result = Vec::new();
        let mut slot = lo;
        while slot < count {
            let record = self.read(slot)?;
            if record.height != height {
                break;
            }
            result.push(record.block_id);
            slot += 1;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vertex_database::prelude::create_temp_db;

    fn record(block: u64, version: u64, height: u64) -> TopoRecord {
        TopoRecord { block_id: block.into(), state_version: version, height }
    }

    #[test]
    fn test_write_read_count() {
        let (_lifetime, db) = create_temp_db();
        let store = DbTopoStore::new(db, 16);
        assert_eq!(store.count(), 0);
        assert!(store.top().is_none());

        store.write(0, record(10, 1, 0)).unwrap();
        store.write(1, record(11, 2, 1)).unwrap();
        store.write(2, record(12, 3, 1)).unwrap();
        assert_eq!(store.count(), 3);
        assert_eq!(store.top().unwrap().block_id, 12.into());
        assert_eq!(store.block_slot(11.into()), Some(1));
        assert!(store.is_block_ordered(12.into()));
        assert!(!store.is_block_ordered(99.into()));
    }

    #[test]
    fn test_binary_search_height() {
        let (_lifetime, db) = create_temp_db();
        let store = DbTopoStore::new(db, 16);
        store.write(0, record(10, 1, 0)).unwrap();
        store.write(1, record(11, 2, 1)).unwrap();
        store.write(2, record(12, 3, 1)).unwrap();
        store.write(3, record(13, 4, 2)).unwrap();

        assert_eq!(store.binary_search_height(1).unwrap(), vec![11.into(), 12.into()]);
        assert_eq!(store.binary_search_height(2).unwrap(), vec![13.into()]);
        assert!(store.binary_search_height(3).unwrap().is_empty());
    }

    #[test]
    fn test_clean_shrinks_count() {
        let (_lifetime, db) = create_temp_db();
        let store = DbTopoStore::new(db, 16);
        store.write(0, record(10, 1, 0)).unwrap();
        store.write(1, record(11, 2, 1)).unwrap();
        store.clean(1).unwrap();
        assert_eq!(store.count(), 1);
        assert!(!store.is_block_ordered(11.into()));
        assert!(store.read(1).is_err());
    }

    #[test]
    fn test_reorged_slot_invalidates_reverse_lookup() {
        let (_lifetime, db) = create_temp_db();
        let store = DbTopoStore::new(db, 16);
        store.write(0, record(10, 1, 0)).unwrap();
        store.write(1, record(11, 2, 1)).unwrap();
        // Slot 1 is rewritten by a reorg; block 11 is no longer ordered
        store.write(1, record(12, 2, 1)).unwrap();
        assert!(!store.is_block_ordered(11.into()));
        assert_eq!(store.block_slot(12.into()), Some(1));
    }
}
