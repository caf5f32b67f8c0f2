use crate::{constants::perf::DIFFICULTY_CACHE_SIZE, processes::dag::DagIndex};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use vertex_consensus_core::config::params::Params;
use vertex_hashes::{ContentHasher, Hash, HasherExtensions};

/// Difficulty retarget over a trailing window of the DAG's ordered past.
/// Results are memoized in an LRU keyed by the tip set; the cache is a
/// performance aid only, the computation is deterministic per tips.
pub struct DifficultyManager {
    dag: DagIndex,
    block_time_ms: u64,
    window: usize,
    minimum_difficulty: u64,
    simulator: bool,
    cache: Mutex<LruCache<Hash, u64>>,
}

impl DifficultyManager {
    pub fn new(dag: DagIndex, params: &Params, simulator: bool) -> Self {
        Self {
            dag,
            block_time_ms: params.block_time_ms,
            window: params.difficulty_window,
            minimum_difficulty: params.minimum_difficulty,
            simulator,
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(DIFFICULTY_CACHE_SIZE).expect("cache bound is non-zero"))),
        }
    }

    pub fn difficulty_at_tips(&self, tips: &[Hash]) -> u64 {
        // Simulator mode pins difficulty so blocks can be produced instantly
        if self.simulator {
            return 1;
        }
        if tips.is_empty() {
            return self.minimum_difficulty;
        }

        let key = tips_digest(tips);
        if let Some(difficulty) = self.cache.lock().get(&key) {
            return *difficulty;
        }

        let difficulty = self.compute_difficulty(tips);
        self.cache.lock().put(key, difficulty);
        difficulty
    }

    fn compute_difficulty(&self, tips: &[Hash]) -> u64 {
        // Walk back from the highest tip and compare the observed spacing of
        // the trailing window against the target spacing
        let best_tip = tips
            .iter()
            .copied()
            .max_by_key(|tip| (self.dag.height_at(*tip).unwrap_or(0), *tip))
            .expect("tips is non-empty");
        let window = match self.dag.ordered_past(best_tip, self.window) {
            Ok(window) => window,
            Err(_) => return self.minimum_difficulty,
        };
        if window.len() < 2 {
            return self.minimum_difficulty;
        }

        let newest = self.dag.timestamp_at(window[0]).unwrap_or(0);
        let oldest = self.dag.timestamp_at(*window.last().expect("window has at least two entries")).unwrap_or(0);
        let observed_span = newest.saturating_sub(oldest).max(1);
        let target_span = self.block_time_ms * (window.len() as u64 - 1);

        (self.minimum_difficulty.saturating_mul(target_span) / observed_span).max(self.minimum_difficulty)
    }
}

fn tips_digest(tips: &[Hash]) -> Hash {
    let mut hasher = ContentHasher::new();
    hasher.write_hashes(tips);
    hasher.finalize()
}
