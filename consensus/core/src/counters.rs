use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct ProcessingCounters {
    pub blocks_submitted: AtomicU64,
    pub blocks_accepted: AtomicU64,
    pub blocks_rejected: AtomicU64,
    pub txs_committed: AtomicU64,
    pub slots_executed: AtomicU64,
    pub side_blocks: AtomicU64,
    pub block_body_bytes: AtomicU64,
}

impl ProcessingCounters {
    pub fn snapshot(&self) -> ProcessingCountersSnapshot {
        ProcessingCountersSnapshot {
            blocks_submitted: self.blocks_submitted.load(Ordering::Relaxed),
            blocks_accepted: self.blocks_accepted.load(Ordering::Relaxed),
            blocks_rejected: self.blocks_rejected.load(Ordering::Relaxed),
            txs_committed: self.txs_committed.load(Ordering::Relaxed),
            slots_executed: self.slots_executed.load(Ordering::Relaxed),
            side_blocks: self.side_blocks.load(Ordering::Relaxed),
            block_body_bytes: self.block_body_bytes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ProcessingCountersSnapshot {
    pub blocks_submitted: u64,
    pub blocks_accepted: u64,
    pub blocks_rejected: u64,
    pub txs_committed: u64,
    pub slots_executed: u64,
    pub side_blocks: u64,
    pub block_body_bytes: u64,
}

impl core::ops::Sub for &ProcessingCountersSnapshot {
    type Output = ProcessingCountersSnapshot;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::Output {
            blocks_submitted: self.blocks_submitted.saturating_sub(rhs.blocks_submitted),
            blocks_accepted: self.blocks_accepted.saturating_sub(rhs.blocks_accepted),
            blocks_rejected: self.blocks_rejected.saturating_sub(rhs.blocks_rejected),
            txs_committed: self.txs_committed.saturating_sub(rhs.txs_committed),
            slots_executed: self.slots_executed.saturating_sub(rhs.slots_executed),
            side_blocks: self.side_blocks.saturating_sub(rhs.side_blocks),
            block_body_bytes: self.block_body_bytes.saturating_sub(rhs.block_body_bytes),
        }
    }
}
