//! The merge service: shared state behind the HTTP surface
//!
//! [`MergeService`] owns the artifact store and the components that act on
//! it. Its methods are organized by concern:
//! - this file: construction, merging and downloading
//! - [`lifecycle`]: shutdown coordination

mod lifecycle;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::artifact_store::ArtifactStore;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::download::{ArtifactDownload, DownloadHandler};
use crate::encoder::{self, Encoder};
use crate::error::{Error, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::job::JobRunner;
use crate::sweeper::{Sweeper, SweeperHandle};
use crate::types::{ArtifactHandle, ArtifactId, MergeRequest};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Handle to the running merge service
///
/// Construct one per process with [`MergeService::new`] and share it behind
/// an `Arc`.
pub struct MergeService {
    config: Arc<Config>,
    store: Arc<ArtifactStore>,
    runner: JobRunner,
    downloads: DownloadHandler,
    sweeper: Mutex<Option<SweeperHandle>>,
    /// Cleared when shutdown begins
    accepting: AtomicBool,
    /// Merge requests currently running
    active_jobs: AtomicUsize,
}

impl MergeService {
    /// Start the service with production components
    ///
    /// Uses an HTTP fetcher and ffmpeg (or a stand-in that fails every encode
    /// when no ffmpeg binary can be found).
    pub async fn new(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        let encoder = encoder::from_config(&config.encoder);
        Self::with_components(config, Arc::new(fetcher), encoder, Arc::new(SystemClock)).await
    }

    /// Start the service with injected components
    ///
    /// Creates the work directory, removes files a previous process left there
    /// and starts the sweeper. Must be called inside a Tokio runtime.
    pub async fn with_components(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        encoder: Arc<dyn Encoder>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let work_dir = &config.artifacts.work_dir;
        tokio::fs::create_dir_all(work_dir).await.map_err(|e| Error::Config {
            message: format!("cannot create work directory {}: {e}", work_dir.display()),
            key: Some("artifacts.work_dir".into()),
        })?;

        let store = Arc::new(ArtifactStore::new(clock));
        if let Err(e) = store.purge_orphans(work_dir).await {
            tracing::warn!(?work_dir, error = %e, "failed to scan work directory for orphans");
        }

        let sweeper = Sweeper::new(
            store.clone(),
            config.artifacts.ttl,
            config.artifacts.sweep_interval,
        )
        .with_pending_timeout(config.artifacts.pending_timeout)
        .spawn();

        tracing::info!(
            ?work_dir,
            ttl_secs = config.artifacts.ttl.as_secs(),
            encoder = encoder.name(),
            "merge service started"
        );

        Ok(Self {
            runner: JobRunner::new(store.clone(), fetcher, encoder, config.clone()),
            downloads: DownloadHandler::new(store.clone(), config.artifacts.grace_delay),
            config,
            store,
            sweeper: Mutex::new(Some(sweeper)),
            accepting: AtomicBool::new(true),
            active_jobs: AtomicUsize::new(0),
        })
    }

    /// Merge the inputs of `request` into a downloadable video under `id`
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] once shutdown has begun
    /// - [`Error::Fetch`] / [`Error::Encode`] / [`Error::Io`] when producing
    ///   the artifact fails; nothing is left on disk in that case
    pub async fn merge(&self, id: &ArtifactId, request: MergeRequest) -> Result<ArtifactHandle> {
        // Counted before the flag check; shutdown clears the flag, then waits on the counter
        let _active = ActiveJob::enter(&self.active_jobs);
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        self.runner.run(id, request).await
    }

    /// Claim `id` for a one-time download
    pub async fn download(&self, id: &ArtifactId) -> Result<ArtifactDownload> {
        Ok(self.downloads.serve(id).await?)
    }

    /// The artifact registry
    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Effective configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether new merge requests are accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    fn take_sweeper(&self) -> Option<SweeperHandle> {
        self.sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Counts a merge as running for as long as it is alive
struct ActiveJob<'a>(&'a AtomicUsize);

impl<'a> ActiveJob<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
