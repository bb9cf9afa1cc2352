// ==================== PURGE SWEEPER ====================
// Finishes cascade deletes that were interrupted (posts still marked
// `deleting`). Runs once at startup and then on a fixed interval.

use crate::sync::CascadeDeleteCoordinator;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

pub fn start_purge_sweeper(cascade: Arc<CascadeDeleteCoordinator>, every_secs: u64) -> JoinHandle<()> {
    log::info!("🧹 Starting purge sweeper (every {}s)", every_secs);

    tokio::spawn(async move {
        // first tick fires immediately
        let mut interval = interval(Duration::from_secs(every_secs));

        loop {
            interval.tick().await;
            sweep(&cascade).await;
        }
    })
}

/// One pass over the marked posts.
pub async fn sweep(cascade: &CascadeDeleteCoordinator) -> usize {
    match cascade.resume_pending().await {
        Ok(0) => {
            log::debug!("🧹 Purge sweep: nothing pending");
            0
        }
        Ok(count) => {
            log::info!("✅ Purge sweep completed {} interrupted delete(s)", count);
            count
        }
        Err(e) => {
            log::error!("❌ Purge sweep failed: {}", e);
            0
        }
    }
}
