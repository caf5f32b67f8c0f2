use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info};
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};
use vertex_consensus_core::counters::ProcessingCounters;

const DUMP_INTERVAL: Duration = Duration::from_secs(10);

/// Spawns the metrics dumper: periodically logs processing-counter deltas
/// until the exit channel closes. Instrumentation must never take the chain
/// down, so the dump body is contained.
pub fn spawn_monitor(counters: Arc<ProcessingCounters>, node_tag: Option<String>, exit: Receiver<()>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("metrics-monitor".to_string())
        .spawn(move || {
            let tag = node_tag.unwrap_or_else(|| "vertex".to_string());
            let mut last = counters.snapshot();
            loop {
                match exit.recv_timeout(DUMP_INTERVAL) {
                    Err(RecvTimeoutError::Timeout) => {
                        let result = catch_unwind(AssertUnwindSafe(|| {
                            let snapshot = counters.snapshot();
                            let delta = &snapshot - &last;
                            if delta.blocks_submitted > 0 {
                                info!(
                                    "[{tag}] blocks: {} submitted, {} accepted, {} rejected; txs committed: {}; slots executed: {} ({} side); body bytes: {}",
                                    delta.blocks_submitted,
                                    delta.blocks_accepted,
                                    delta.blocks_rejected,
                                    delta.txs_committed,
                                    delta.slots_executed,
                                    delta.side_blocks,
                                    delta.block_body_bytes,
                                );
                            }
                            snapshot
                        }));
                        match result {
                            Ok(snapshot) => last = snapshot,
                            Err(_) => error!("recovered while instrumenting"),
                        }
                    }
                    // A value or a disconnect both mean the chain is going down
                    _ => break,
                }
            }
            debug!("metrics monitor stopped");
        })
        .expect("spawning the metrics monitor cannot fail")
}
