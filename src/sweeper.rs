//! Background expiry of undownloaded artifacts
//!
//! The sweeper wakes on a fixed interval, asks the [`ArtifactStore`] for
//! expired records and evicts them. It also reaps `Pending` reservations
//! whose job vanished without cleaning up. It never reports errors to anyone:
//! failures are logged and the record is dropped from the store regardless.
//!
//! # Example
//!
//! ```no_run
//! use ffmerge::artifact_store::ArtifactStore;
//! use ffmerge::clock::SystemClock;
//! use ffmerge::sweeper::Sweeper;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let store = Arc::new(ArtifactStore::new(Arc::new(SystemClock)));
//! let handle = Sweeper::new(store, Duration::from_secs(300), Duration::from_secs(60)).spawn();
//!
//! // ... later, during shutdown
//! handle.shutdown().await;
//! # }
//! ```

use crate::artifact_store::ArtifactStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Age after which a `Pending` reservation is considered abandoned
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Periodic evictor of expired artifacts
pub struct Sweeper {
    store: Arc<ArtifactStore>,
    ttl: Duration,
    interval: Duration,
    pending_timeout: Duration,
}

impl Sweeper {
    /// Creates a new sweeper
    ///
    /// # Parameters
    /// - `store`: registry to sweep; its clock decides what is expired
    /// - `ttl`: maximum age of an undownloaded artifact
    /// - `interval`: time between sweeps
    pub fn new(store: Arc<ArtifactStore>, ttl: Duration, interval: Duration) -> Self {
        Self {
            store,
            ttl,
            interval,
            pending_timeout: DEFAULT_PENDING_TIMEOUT,
        }
    }

    /// Reap `Pending` reservations older than `timeout`
    pub fn with_pending_timeout(mut self, timeout: Duration) -> Self {
        self.pending_timeout = timeout;
        self
    }

    /// Run one sweep and return the number of evicted artifacts
    pub async fn sweep_once(&self) -> usize {
        let now = self.store.clock().now();
        let mut evicted = self.reap_stale_pending(now).await;

        let expired = self.store.list_expired(now, self.ttl);
        if expired.is_empty() {
            debug!("sweep found nothing to expire");
            return evicted;
        }

        for id in &expired {
            if self.store.evict_if_expired(id, now, self.ttl).await {
                evicted += 1;
            } else {
                // Started downloading or was deleted since the listing
                debug!(artifact_id = %id, "expired artifact changed state before eviction");
            }
        }

        info!(
            candidates = expired.len(),
            evicted, "expired artifacts swept"
        );
        evicted
    }

    async fn reap_stale_pending(&self, now: chrono::DateTime<chrono::Utc>) -> usize {
        let mut reaped = 0;
        for id in self.store.list_stale_pending(now, self.pending_timeout) {
            if self
                .store
                .evict_if_stale_pending(&id, now, self.pending_timeout)
                .await
            {
                warn!(artifact_id = %id, "reaped abandoned pending artifact");
                reaped += 1;
            }
        }
        reaped
    }

    /// Start the sweeper on the current runtime
    pub fn spawn(self) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        SweeperHandle { cancel, task }
    }

    /// Sweep every `interval` until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            ttl_secs = self.ttl.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Sweeper task started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it so sweeps happen at
        // interval boundaries.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = cancel.cancelled() => {
                    break;
                }
            }
        }

        info!("Sweeper task stopped");
    }
}

/// Handle to a running sweeper
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "sweeper task ended abnormally");
        }
    }

    /// Whether the sweeper task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
