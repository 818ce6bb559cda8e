//! Shared test helpers: fake collaborators and service construction.

use super::MergeService;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::encoder::{EncodeJob, Encoder};
use crate::error::{EncodeError, FetchError};
use crate::fetch::{FetchLimits, Fetcher};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Configuration rooted in `work_dir` with short delays
pub(crate) fn test_config(work_dir: &Path) -> Config {
    let mut config = Config::default();
    config.artifacts.work_dir = work_dir.to_path_buf();
    config.artifacts.grace_delay = Duration::from_millis(50);
    config.encoder.search_path = false;
    config
}

/// Service with fakes and the system clock. Keep the tempdir alive.
pub(crate) async fn create_test_service(
    fetcher: FakeFetcher,
    encoder: FakeEncoder,
) -> (MergeService, tempfile::TempDir) {
    create_test_service_with_clock(fetcher, encoder, Arc::new(SystemClock)).await
}

/// Service with fakes and a caller-supplied clock
pub(crate) async fn create_test_service_with_clock(
    fetcher: FakeFetcher,
    encoder: FakeEncoder,
    clock: Arc<dyn Clock>,
) -> (MergeService, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let service = MergeService::with_components(
        test_config(dir.path()),
        Arc::new(fetcher),
        Arc::new(encoder),
        clock,
    )
    .await
    .unwrap();
    (service, dir)
}

/// In-memory [`Fetcher`]; unknown URLs answer 404
#[derive(Clone, Default)]
pub(crate) struct FakeFetcher {
    responses: Arc<HashMap<String, Result<Vec<u8>, FetchError>>>,
    calls: Arc<AtomicUsize>,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(self, url: &str, body: Vec<u8>) -> Self {
        self.respond(url, Ok(body))
    }

    pub(crate) fn failing(self, url: &str, error: FetchError) -> Self {
        self.respond(url, Err(error))
    }

    fn respond(self, url: &str, response: Result<Vec<u8>, FetchError>) -> Self {
        let mut responses = (*self.responses).clone();
        responses.insert(url.to_string(), response);
        Self {
            responses: Arc::new(responses),
            calls: self.calls,
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str, _limits: FetchLimits) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                })
            })
    }
}

/// [`Encoder`] that writes a file of a fixed size, or fails
#[derive(Clone)]
pub(crate) struct FakeEncoder {
    output_bytes: usize,
    failure: Option<EncodeError>,
    delay: Duration,
    last_job: Arc<Mutex<Option<EncodeJob>>>,
}

impl FakeEncoder {
    /// Succeeds, writing `output_bytes` bytes to the output path
    pub(crate) fn writing(output_bytes: usize) -> Self {
        Self {
            output_bytes,
            failure: None,
            delay: Duration::ZERO,
            last_job: Arc::default(),
        }
    }

    /// Writes a partial output and then fails with `error`
    pub(crate) fn failing_after_partial_write(error: EncodeError) -> Self {
        Self {
            failure: Some(error),
            ..Self::writing(128)
        }
    }

    /// Take `delay` before finishing
    pub(crate) fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn last_job(&self) -> Option<EncodeJob> {
        self.last_job.lock().unwrap().clone()
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<(), EncodeError> {
        *self.last_job.lock().unwrap() = Some(job.clone());
        assert!(job.image_path.exists(), "image must be staged before encoding");
        assert!(job.audio_path.exists(), "audio must be staged before encoding");

        tokio::fs::write(&job.output_path, vec![0u8; self.output_bytes])
            .await
            .unwrap();
        tokio::time::sleep(self.delay).await;
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
