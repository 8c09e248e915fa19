use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::AppState;

/// Start the background expiration cleaner task.
///
/// Reads already ignore expired entries; this only reclaims their space.
pub fn start_expiration_cleaner(state: Arc<AppState>) -> JoinHandle<()> {
    let interval = Duration::from_secs(state.config.store.cleanup_interval_seconds);

    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);

        loop {
            interval_timer.tick().await;
            run_cleanup(&state).await;
        }
    })
}

/// Purge expired entries once. Returns how many were removed.
pub async fn run_cleanup(state: &AppState) -> usize {
    debug!("Running expiration cleanup");

    let store = Arc::clone(&state.store);
    let result = tokio::task::spawn_blocking(move || store.purge_expired()).await;

    match result {
        Ok(Ok(count)) => {
            if count > 0 {
                debug!(entries_cleaned = count, "Expired entries cleaned");
            }
            count
        }
        Ok(Err(e)) => {
            error!(error = %e, "Failed to clean up expired entries");
            0
        }
        Err(e) => {
            error!(error = %e, "Expiration cleanup task panicked");
            0
        }
    }
}
