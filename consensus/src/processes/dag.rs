use crate::model::stores::block_store::{BlockStoreReader, DbBlockStore};
use std::sync::Arc;
use vertex_database::prelude::StoreResult;
use vertex_hashes::Hash;

/// Read-only view over the DAG structure: past relations, heights at blocks
/// and the reachability shape rule. Everything is derived from stored block
/// records; no separate relations column is maintained.
#[derive(Clone)]
pub struct DagIndex {
    block_store: Arc<DbBlockStore>,
}

impl DagIndex {
    pub fn new(block_store: Arc<DbBlockStore>) -> Self {
        Self { block_store }
    }

    pub fn block_exists(&self, hash: Hash) -> bool {
        self.block_store.block_exists(hash)
    }

    /// The direct past (tips) of a stored block
    pub fn past(&self, hash: Hash) -> StoreResult<Vec<Hash>> {
        Ok(self.block_store.get(hash)?.tips.clone())
    }

    pub fn height_at(&self, hash: Hash) -> StoreResult<u64> {
        Ok(self.block_store.get(hash)?.height)
    }

    pub fn timestamp_at(&self, hash: Hash) -> StoreResult<u64> {
        Ok(self.block_store.get(hash)?.timestamp)
    }

    /// The height a block building on `tips` resolves to: one above the
    /// highest tip, or zero for genesis
    pub fn height_at_tips(&self, tips: &[Hash]) -> StoreResult<u64> {
        let mut best = 0;
        for tip in tips {
            best = best.max(self.height_at(*tip)? + 1);
        }
        Ok(best)
    }

    /// The DAG shape rule: two tips may only be merged when they are siblings
    /// at the same height descending from one common singleton parent. With a
    /// single tip the rule reaches one level deeper and checks that a past
    /// merge was itself well formed. Below height 2 there is not enough
    /// history to check anything.
    pub fn check_dag_structure(&self, tips: &[Hash]) -> StoreResult<bool> {
        if self.height_at(tips[0])? <= 2 {
            return Ok(true);
        }

        for tip in tips {
            // First make sure all the tips are at the same height
            if self.height_at(tips[0])? != self.height_at(*tip)? {
                return Ok(false);
            }
        }

        match tips.len() {
            1 => {
                let past = self.past(tips[0])?;
                match past.len() {
                    1 => {} // Nothing to check here
                    2 => {
                        if self.height_at(past[0])? != self.height_at(past[1])? {
                            return Ok(false);
                        }
                        let past0 = self.past(past[0])?;
                        if past0.len() != 1 {
                            return Ok(false);
                        }
                        let past1 = self.past(past[1])?;
                        if past1.len() != 1 {
                            return Ok(false);
                        }
                        if past0[0] != past1[0] {
                            return Ok(false);
                        }
                    }
                    _ => return Ok(false),
                }
            }
            2 => {
                // Both tips must originate from the same singleton parent
                let past0 = self.past(tips[0])?;
                if past0.len() != 1 {
                    return Ok(false);
                }
                let past1 = self.past(tips[1])?;
                if past0.len() != past1.len() {
                    return Ok(false);
                }
                if past0[0] != past1[0] {
                    return Ok(false);
                }
            }
            _ => return Ok(false),
        }

        Ok(true)
    }

    /// Collects the past of `tip` as an ordered sequence, walking backwards.
    /// Two parents are appended in ascending byte order of their hashes, which
    /// is the deterministic tiebreak the linearizer relies on. The walk stops
    /// at genesis or once `count` entries were collected.
    pub fn ordered_past(&self, tip: Hash, count: usize) -> StoreResult<Vec<Hash>> {
        let mut order = vec![tip];
        let mut current = tip;
        while order.len() < count {
            let past = self.past(current)?;
            match past.len() {
                0 => return Ok(order), // We reached genesis
                1 => {
                    order.push(past[0]);
                    current = past[0];
                }
                2 => {
                    if past[0] < past[1] {
                        order.extend([past[0], past[1]]);
                    } else {
                        order.extend([past[1], past[0]]);
                    }
                    current = past[0];
                }
                _ => panic!("data corruption: block {current} has more than two parents"),
            }
        }
        Ok(order)
    }
}
