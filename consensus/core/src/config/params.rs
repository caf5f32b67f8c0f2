use crate::ForkVersion;
use vertex_hashes::Hash;

/// A hard-fork activation entry: blocks at `height` and above must carry `version`
#[derive(Clone, Copy, Debug)]
pub struct HardFork {
    pub height: u64,
    pub version: ForkVersion,
}

/// Consensus parameters of a Vertex network
#[derive(Clone, Debug)]
pub struct Params {
    /// Depth below the chain height at which blocks are final for reorg purposes
    pub stable_limit: u64,
    /// Milliseconds a block timestamp may run ahead of local time
    pub timestamp_slack_ms: u64,
    /// Upper bound on the summed serialized size of a block's transactions
    pub max_block_size: u64,
    /// Upper bound on a single mempool transaction
    pub max_tx_size: u64,
    /// Heights a transaction's nonce window spans from its height claim
    pub tx_validity_height: u64,
    /// Maximum mini blocks aggregated by one block
    pub miniblocks_per_block: usize,
    /// Target block spacing in milliseconds
    pub block_time_ms: u64,
    /// Trailing blocks consulted by the difficulty retarget
    pub difficulty_window: usize,
    pub minimum_difficulty: u64,
    /// Required fee per serialized byte
    pub fee_per_byte: u64,
    /// Coinbase reward credited per non-side block
    pub base_reward: u64,
    /// Account credited by the genesis premine
    pub dev_address: Hash,
    pub premine_value: u64,
    pub genesis_timestamp: u64,
    pub hard_forks: &'static [HardFork],
}

impl Params {
    /// The hard-fork version required at the given height
    pub fn version_at_height(&self, height: u64) -> ForkVersion {
        self.hard_forks
            .iter()
            .rev()
            .find(|hf| hf.height <= height)
            .map(|hf| hf.version)
            .unwrap_or(1)
    }
}

pub const MAINNET_PARAMS: Params = Params {
    stable_limit: 8,
    timestamp_slack_ms: 50,
    max_block_size: 1_000_000,
    max_tx_size: 300_000,
    tx_validity_height: 11,
    miniblocks_per_block: 10,
    block_time_ms: 18_000,
    difficulty_window: 16,
    minimum_difficulty: 1_000,
    fee_per_byte: 1,
    base_reward: 615_000,
    dev_address: Hash::from_bytes([
        0xa1, 0x5b, 0x99, 0x26, 0x0c, 0x43, 0x8e, 0x6c, 0x1c, 0x9d, 0xd4, 0x1c, 0x47, 0x1b, 0x7b, 0xb8, 0x1e, 0x27, 0x1f, 0xbe,
        0x32, 0x40, 0x57, 0x3d, 0x2a, 0x8e, 0x6d, 0x56, 0xfa, 0x8d, 0x0a, 0x75,
    ]),
    premine_value: 2_125_000_000,
    genesis_timestamp: 1_671_271_200_000,
    hard_forks: &[HardFork { height: 0, version: 1 }],
};

/// Simulator/devnet parameters: difficulty pinned to the minimum of 1 and a
/// short premine, matching the `--simulator` runtime switch
pub const SIMNET_PARAMS: Params = Params {
    stable_limit: 8,
    timestamp_slack_ms: 50,
    max_block_size: 1_000_000,
    max_tx_size: 300_000,
    tx_validity_height: 11,
    miniblocks_per_block: 10,
    block_time_ms: 1_000,
    difficulty_window: 16,
    minimum_difficulty: 1,
    fee_per_byte: 1,
    base_reward: 615_000,
    dev_address: Hash::from_bytes([
        0xa1, 0x5b, 0x99, 0x26, 0x0c, 0x43, 0x8e, 0x6c, 0x1c, 0x9d, 0xd4, 0x1c, 0x47, 0x1b, 0x7b, 0xb8, 0x1e, 0x27, 0x1f, 0xbe,
        0x32, 0x40, 0x57, 0x3d, 0x2a, 0x8e, 0x6d, 0x56, 0xfa, 0x8d, 0x0a, 0x75,
    ]),
    premine_value: 2_125_000_000,
    genesis_timestamp: 1_671_271_200_000,
    hard_forks: &[HardFork { height: 0, version: 1 }],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_at_height() {
        let forked =
            Params { hard_forks: &[HardFork { height: 0, version: 1 }, HardFork { height: 100, version: 2 }], ..MAINNET_PARAMS };
        assert_eq!(forked.version_at_height(0), 1);
        assert_eq!(forked.version_at_height(99), 1);
        assert_eq!(forked.version_at_height(100), 2);
        assert_eq!(forked.version_at_height(10_000), 2);
    }
}
