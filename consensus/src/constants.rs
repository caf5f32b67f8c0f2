pub mod store_names {
    /// Tree mapping account keys to balance records
    pub const BALANCE_TREE: &str = "balances";
    /// Tree mapping SCIDs to contract metadata
    pub const SC_META: &str = "scmeta";
}

pub mod perf {
    /// Default cache entries for block/tx/topo store accessors
    pub const CACHE_SIZE: u64 = 4096;
    /// Bound of the difficulty-at-tips LRU
    pub const DIFFICULTY_CACHE_SIZE: usize = 8192;
    /// Bound of the registered-address LRU
    pub const ADDRESS_VALID_CACHE_SIZE: usize = 100 * 1024;
    /// Bound of the mining-template LRU
    pub const MINING_BLOCKS_CACHE_SIZE: usize = 256;
}

/// Key under which a contract's code is stored in its data tree
pub const SC_CODE_KEY: &[u8] = b"C";
/// Key under which a contract's deposited balance is tracked in its data tree
pub const SC_BALANCE_KEY: &[u8] = b"B";
