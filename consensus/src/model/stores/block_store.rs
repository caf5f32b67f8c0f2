use std::sync::Arc;
use vertex_consensus_core::block::Block;
use vertex_database::prelude::{CachedDbAccess, DbWriter, StoreResult, StoreResultExtensions, DB};
use vertex_hashes::Hash;

const STORE_PREFIX: &[u8] = b"block-records";

/// Reader API for `BlockStore`
pub trait BlockStoreReader {
    fn has(&self, hash: Hash) -> StoreResult<bool>;
    fn get(&self, hash: Hash) -> StoreResult<Arc<Block>>;
}

/// A DB + cache implementation of the block record store. Blocks are immutable
/// once written, so the store is append-only and needs no locking.
#[derive(Clone)]
pub struct DbBlockStore {
    access: CachedDbAccess<Hash, Arc<Block>>,
}

impl DbBlockStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self { access: CachedDbAccess::new(db, cache_size, STORE_PREFIX) }
    }

    pub fn insert(&self, writer: impl DbWriter, block: Arc<Block>) -> StoreResult<()> {
        self.access.write(writer, block.hash(), block)
    }

    pub fn block_exists(&self, hash: Hash) -> bool {
        self.access.has(hash).unwrap_or(false)
    }

    /// Height of a stored block, `None` when the block is unknown
    pub fn get_height(&self, hash: Hash) -> Option<u64> {
        self.access.read(hash).unwrap_option().map(|b| b.height)
    }

    pub fn get_timestamp(&self, hash: Hash) -> Option<u64> {
        self.access.read(hash).unwrap_option().map(|b| b.timestamp)
    }
}

impl BlockStoreReader for DbBlockStore {
    fn has(&self, hash: Hash) -> StoreResult<bool> {
        self.access.has(hash)
    }

    fn get(&self, hash: Hash) -> StoreResult<Arc<Block>> {
        self.access.read(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vertex_consensus_core::config::{genesis::generate_genesis_block, params::MAINNET_PARAMS};
    use vertex_database::prelude::{create_temp_db, DirectDbWriter};

    #[test]
    fn test_block_store_roundtrip() {
        let (_lifetime, db) = create_temp_db();
        let store = DbBlockStore::new(db.clone(), 16);
        let genesis = generate_genesis_block(&MAINNET_PARAMS);
        let hash = genesis.hash();

        assert!(!store.block_exists(hash));
        store.insert(DirectDbWriter::new(&db), genesis.block.clone()).unwrap();
        assert!(store.block_exists(hash));
        assert_eq!(store.get(hash).unwrap().height, 0);
        assert_eq!(store.get_height(hash), Some(0));
        assert_eq!(store.get_timestamp(hash), Some(MAINNET_PARAMS.genesis_timestamp));
    }
}
