//! Periodic background maintenance — graph edge pruning and conflict-queue
//! pruning. A port of the source system's `gentle_worker_loop`, minus its
//! battery/CPU-load gating: that heuristic existed to avoid competing with
//! foreground work on a laptop running both the assistant and everything
//! else; a dedicated gateway process has no such contention to defer for,
//! so this just runs on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use gw_memory::{ConflictManager, MemoryEngine};
use tokio::sync::Mutex;
use tracing::{info, warn};

const MIN_EDGE_WEIGHT: f64 = 0.1;
const INTERVAL_SECS: u64 = 600;
/// VACUUM rewrites the whole database file, so it runs far less often than
/// the edge/conflict pruning passes above — roughly once an hour at the
/// default interval.
const VACUUM_EVERY_N_TICKS: u64 = 6;

pub fn spawn(memory: Arc<MemoryEngine>, conflicts: Arc<Mutex<ConflictManager>>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(INTERVAL_SECS));
        let mut tick: u64 = 0;
        loop {
            interval.tick().await;
            tick += 1;
            match memory.graph().prune_weak_edges(MIN_EDGE_WEIGHT) {
                Ok(n) if n > 0 => info!(removed = n, "pruned weak graph edges"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "graph pruning failed"),
            }
            conflicts.lock().await.prune_conflicts_now();

            if tick % VACUUM_EVERY_N_TICKS == 0 {
                if let Err(e) = memory.vectors().vacuum() {
                    warn!(error = %e, "vector store vacuum failed");
                }
                if let Err(e) = memory.graph().vacuum() {
                    warn!(error = %e, "graph store vacuum failed");
                }
                info!("ran periodic database vacuum");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    // Timer-driven background loop; exercised indirectly through
    // `ConflictManager`/`KnowledgeGraph` unit tests in their own crates.
}
