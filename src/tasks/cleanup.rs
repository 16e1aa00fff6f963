//! TTL Cleanup Task
//!
//! Background task that periodically purges expired cache entries.
//! Lazy expiry on access stays authoritative; this only reclaims entries
//! nobody reads again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;

/// Spawns a background task that periodically purges expired cache entries.
///
/// Purging runs on the blocking pool since the disk backend does file I/O.
/// The task loops until aborted through the returned handle.
///
/// # Example
/// ```ignore
/// let cache = Cache::memory("sessions");
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), 1);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Cache, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task for '{}' with interval of {} seconds",
            cache.name(),
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let sweep = cache.clone();
            match tokio::task::spawn_blocking(move || sweep.purge_expired()).await {
                Ok(Ok(removed)) if removed > 0 => {
                    info!("TTL cleanup: removed {} expired entries", removed);
                }
                Ok(Ok(_)) => debug!("TTL cleanup: no expired entries found"),
                Ok(Err(e)) => warn!("TTL cleanup failed: {}", e),
                Err(e) => warn!("TTL cleanup task panicked: {}", e),
            }
        }
    })
}
