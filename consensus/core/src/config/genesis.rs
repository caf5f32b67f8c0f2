use crate::{
    block::{Block, CompleteBlock},
    config::params::Params,
    tx::{Allocation, Transaction, TransactionType},
};

/// Builds the deterministic genesis block of a network: no tips, no mini
/// blocks, and a premine miner tx crediting the configured dev allocation.
pub fn generate_genesis_block(params: &Params) -> CompleteBlock {
    let miner_tx = Transaction {
        version: 1,
        tx_type: TransactionType::Premine,
        height: 0,
        miner_address: params.dev_address,
        allocations: vec![Allocation { account: params.dev_address, amount: params.premine_value }],
        payloads: vec![],
    };
    CompleteBlock::from_block(Block {
        major_version: params.version_at_height(0),
        height: 0,
        timestamp: params.genesis_timestamp,
        tips: vec![],
        mini_blocks: vec![],
        miner_tx,
        tx_hashes: vec![],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::params::MAINNET_PARAMS;

    #[test]
    fn test_genesis_is_deterministic() {
        let a = generate_genesis_block(&MAINNET_PARAMS);
        let b = generate_genesis_block(&MAINNET_PARAMS);
        assert_eq!(a.hash(), b.hash());
        assert!(a.block.is_genesis());
        assert!(a.block.miner_tx.is_premine());
    }
}
