use crate::{
    errors::{BlockProcessResult, RuleError},
    model::stores::topo_index::DbTopoStore,
    processes::dag::DagIndex,
};
use std::sync::Arc;
use vertex_hashes::Hash;

/// Blocks are settled once they sit this deep in both histories; no reorg may
/// cross a run of this many identically-ordered blocks.
const SETTLED_RUN: usize = 4;
/// Initial backward-walk depth; doubled whenever no common run is found.
const INITIAL_DEPTH: usize = 20;

/// Converts the DAG's partial order into a full topological order. Invoked
/// whenever a new tip extends the chain height by one; produces the sequence
/// of block ids whose slots must be (re)assigned and the slot the sequence
/// starts at. Slots below the divergence point are never rewritten.
#[derive(Clone)]
pub struct Linearizer {
    dag: DagIndex,
    topo_store: Arc<DbTopoStore>,
}

impl Linearizer {
    pub fn new(dag: DagIndex, topo_store: Arc<DbTopoStore>) -> Self {
        Self { dag, topo_store }
    }

    pub fn generate_full_order(&self, current_tip: Hash, new_tip: Hash) -> BlockProcessResult<(Vec<Hash>, u64)> {
        let current_height = self.dag.height_at(current_tip).expect("the current tip must be stored");
        let new_height = self.dag.height_at(new_tip).expect("the new tip must be stored");
        assert_eq!(new_height, current_height + 1, "dag can only grow one height at a time");

        let mut depth = INITIAL_DEPTH;
        loop {
            let current_history = self.dag.ordered_past(current_tip, depth).expect("the current tip past must be stored");
            let new_history = self.dag.ordered_past(new_tip, depth).expect("the new tip past must be stored");

            // Near genesis there is not enough history for a settled run; match
            // the forward sequences directly instead
            if current_history.len() < SETTLED_RUN + 1 {
                return self.direct_reverse_match(&current_history, &new_history);
            }

            // Search the earliest (closest to the tips) common run appearing
            // identically in both backward walks
            for i in 0..current_history.len().saturating_sub(SETTLED_RUN) {
                for j in 0..new_history.len().saturating_sub(SETTLED_RUN) {
                    if current_history[i..i + SETTLED_RUN] == new_history[j..j + SETTLED_RUN] {
                        let base_topo_index =
                            self.topo_store.block_slot(new_history[j]).expect("a settled block must be topologically ordered");
                        let order: Vec<Hash> = new_history[..=j].iter().rev().copied().collect();
                        return Ok((order, base_topo_index));
                    }
                }
            }

            // Both walks already reached genesis without a common run
            if current_history.len() < depth && new_history.len() < depth {
                return Err(RuleError::DivergenceNotFound);
            }
            depth *= 2;
        }
    }

    /// Short-history fallback: reverse both sequences to forward order and
    /// take the new side's suffix from the first position the current history
    /// does not contain.
    fn direct_reverse_match(&self, current_history: &[Hash], new_history: &[Hash]) -> BlockProcessResult<(Vec<Hash>, u64)> {
        let current_rev: Vec<Hash> = current_history.iter().rev().copied().collect();
        let new_rev: Vec<Hash> = new_history.iter().rev().copied().collect();

        for (j, hash) in new_rev.iter().enumerate() {
            if !current_rev.contains(hash) {
                if j == 0 {
                    // The histories share nothing, not even genesis
                    return Err(RuleError::DivergenceNotFound);
                }
                let base_topo_index =
                    self.topo_store.block_slot(new_rev[j - 1]).expect("the contention base must be topologically ordered") + 1;
                return Ok((new_rev[j..].to_vec(), base_topo_index));
            }
        }
        Err(RuleError::DivergenceNotFound)
    }
}
