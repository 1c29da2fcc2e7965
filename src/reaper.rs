use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::clock::Clock;
use crate::engine::Engine;

/// Background task that completes reservations whose window has ended.
/// Every admission and cancellation also sweeps inline, so this only bounds
/// how stale listings can get on an idle tenant.
pub async fn run_reaper(engine: Arc<Engine>, every: Duration, clock: Arc<dyn Clock>) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match engine.sweep(clock.now()).await {
            Ok(0) => {}
            Ok(n) => info!("reaper completed {n} expired reservation(s)"),
            Err(e) => error!("reaper sweep failed: {e}"),
        }
    }
}

/// Background task that rewrites the WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        if engine.wal_appends_since_compact().await < threshold {
            continue;
        }
        match engine.compact_wal().await {
            Ok(()) => info!("WAL compacted"),
            Err(e) => error!("WAL compaction failed: {e}"),
        }
    }
}
