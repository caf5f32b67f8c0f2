//! Content hashing of consensus objects. Fields are written manually with
//! explicit framing so object ids do not depend on any serde encoding details.

use crate::{
    block::Block,
    miniblock::MiniBlock,
    tx::{ScOp, Transaction},
};
use vertex_hashes::{ContentHasher, Hash, HasherExtensions};

pub fn block_hash(block: &Block) -> Hash {
    let mut hasher = ContentHasher::new();
    hasher
        .write_u8(block.major_version)
        .write_u64(block.height)
        .write_u64(block.timestamp)
        .write_hashes(&block.tips);
    hasher.write_len(block.mini_blocks.len());
    for mb in &block.mini_blocks {
        hasher.write_hash(mb.hash());
    }
    hasher.write_hash(tx_id(&block.miner_tx)).write_hashes(&block.tx_hashes);
    hasher.finalize()
}

pub fn tx_id(tx: &Transaction) -> Hash {
    let mut hasher = ContentHasher::new();
    hasher
        .write_u8(tx.version)
        .write_u8(tx.tx_type.tag())
        .write_u64(tx.height)
        .write_hash(tx.miner_address);
    hasher.write_len(tx.allocations.len());
    for alloc in &tx.allocations {
        hasher.write_hash(alloc.account).write_u64(alloc.amount);
    }
    hasher.write_len(tx.payloads.len());
    for payload in &tx.payloads {
        hasher
            .write_hash(payload.scid)
            .write_hash(payload.nonce)
            .write_hash(payload.source)
            .write_hash(payload.destination)
            .write_u64(payload.amount)
            .write_u64(payload.burn)
            .write_u64(payload.fee);
        hasher.write_len(payload.sc_ops.len());
        for op in &payload.sc_ops {
            write_sc_op(&mut hasher, op);
        }
    }
    hasher.finalize()
}

pub fn miniblock_hash(mb: &MiniBlock) -> Hash {
    let mut hasher = ContentHasher::new();
    hasher
        .write_u8(mb.version)
        .write_u64(mb.height)
        .write_u64(mb.timestamp)
        .write_hash(mb.key_hash)
        .write_hash(mb.past_digest)
        .write_u64(mb.nonce);
    hasher.finalize()
}

fn write_sc_op(hasher: &mut ContentHasher, op: &ScOp) {
    match op {
        ScOp::Install { code } => {
            hasher.write_u8(0).write_var_bytes(code);
        }
        ScOp::Store { key, value } => {
            hasher.write_u8(1).write_var_bytes(key).write_var_bytes(value);
        }
        ScOp::Delete { key } => {
            hasher.write_u8(2).write_var_bytes(key);
        }
        ScOp::Deposit { amount } => {
            hasher.write_u8(3).write_u64(*amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::TransactionType;

    #[test]
    fn test_block_hash_covers_tips() {
        let tx = Transaction {
            version: 1,
            tx_type: TransactionType::Coinbase,
            height: 1,
            miner_address: 5.into(),
            allocations: vec![],
            payloads: vec![],
        };
        let mut block = Block {
            major_version: 1,
            height: 1,
            timestamp: 1000,
            tips: vec![7.into()],
            mini_blocks: vec![],
            miner_tx: tx,
            tx_hashes: vec![],
        };
        let h1 = block.hash();
        block.tips = vec![8.into()];
        assert_ne!(block.hash(), h1);
    }
}
