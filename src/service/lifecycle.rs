//! Shutdown coordination.

use super::MergeService;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// How long shutdown waits for running merges
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl MergeService {
    /// Gracefully shut down the service
    ///
    /// 1. Stops accepting merge requests ([`Error::ShuttingDown`](crate::Error::ShuttingDown))
    /// 2. Waits for running merges, up to 30 seconds
    /// 3. Stops the sweeper and waits for it to exit
    /// 4. Deletes every remaining artifact, downloaded or not
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating graceful shutdown");

        self.accepting.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting merge requests");

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::debug!("No merges running"),
            Err(_) => tracing::warn!(
                active_jobs = self.active_jobs.load(Ordering::SeqCst),
                "Timeout waiting for merges to finish, proceeding with shutdown"
            ),
        }

        if let Some(sweeper) = self.take_sweeper() {
            sweeper.shutdown().await;
        }

        let removed = self.store.clear().await;
        tracing::info!(removed, "Graceful shutdown complete");
    }

    async fn wait_for_active_jobs(&self) {
        loop {
            let active = self.active_jobs.load(Ordering::SeqCst);
            if active == 0 {
                return;
            }
            tracing::debug!(active, "Waiting for merges to finish");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
