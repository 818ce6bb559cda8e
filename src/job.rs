//! One merge request from inputs to a registered artifact
//!
//! [`JobRunner::run`] reserves the identifier, gathers both inputs, stages
//! them in the work directory, runs the encoder and publishes the result.
//! Staged inputs never outlive the call, and a failed run leaves nothing
//! behind: neither a record nor a partial output file. The same holds when
//! the run is cancelled, e.g. because the client hung up: a guard schedules
//! the cleanup from its `Drop`.

use crate::artifact_store::ArtifactStore;
use crate::config::Config;
use crate::encoder::{EncodeJob, Encoder};
use crate::error::{Error, Result};
use crate::fetch::{FetchLimits, Fetcher};
use crate::types::{ArtifactHandle, ArtifactId, ImageSource, MergeRequest};
use crate::utils::{self, StagedPaths};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Runs merge jobs against a shared store
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<ArtifactStore>,
    fetcher: Arc<dyn Fetcher>,
    encoder: Arc<dyn Encoder>,
    config: Arc<Config>,
}

impl JobRunner {
    /// Create a runner
    pub fn new(
        store: Arc<ArtifactStore>,
        fetcher: Arc<dyn Fetcher>,
        encoder: Arc<dyn Encoder>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            fetcher,
            encoder,
            config,
        }
    }

    /// Produce the artifact for `request` under `id`
    ///
    /// On success the artifact is `Ready` and its expiry window has started.
    /// On failure the store holds no record for `id` and no file for it
    /// remains in the work directory.
    pub async fn run(&self, id: &ArtifactId, request: MergeRequest) -> Result<ArtifactHandle> {
        let work_dir = &self.config.artifacts.work_dir;
        let output = utils::output_path(work_dir, id);
        self.store.reserve(id, output.clone(), utils::display_name(id))?;

        let mut guard = AbandonGuard::new(self.store.clone(), id.clone(), output.clone());
        let result = self.produce(id, request, &mut guard).await;
        if let Err(e) = &result {
            warn!(request_id = %id, error = %e, "merge failed, discarding artifact");
            self.store.delete(id).await;
            // The record may already be gone (shutdown), but the encoder can
            // still have created the file after that.
            utils::remove_file_logged(&output).await;
        }
        guard.disarm();
        result
    }

    async fn produce(
        &self,
        id: &ArtifactId,
        request: MergeRequest,
        guard: &mut AbandonGuard,
    ) -> Result<ArtifactHandle> {
        let started = Instant::now();
        let fetch = &self.config.fetch;

        let image = match request.image {
            ImageSource::Remote(url) => {
                debug!(request_id = %id, url = %url, "fetching image");
                self.fetcher
                    .fetch(url.as_str(), FetchLimits::image(fetch))
                    .await?
            }
            ImageSource::Inline(bytes) => bytes,
        };

        debug!(request_id = %id, url = %request.audio_url, "fetching audio");
        let audio = self
            .fetcher
            .fetch(request.audio_url.as_str(), FetchLimits::audio(fetch))
            .await?;

        let paths = StagedPaths::new(
            &self.config.artifacts.work_dir,
            id,
            utils::image_extension(&image),
        );
        guard.track(paths.image.clone());
        guard.track(paths.audio.clone());
        info!(
            request_id = %id,
            image_bytes = image.len(),
            audio_bytes = audio.len(),
            resolution = %request.resolution,
            "inputs ready, encoding"
        );

        let encoded = self.stage_and_encode(id, &paths, &image, &audio, request.resolution).await;
        utils::remove_file_logged(&paths.image).await;
        utils::remove_file_logged(&paths.audio).await;
        encoded?;

        let size_bytes = tokio::fs::metadata(&paths.output).await?.len();
        let record = self.store.promote(id, size_bytes)?;

        info!(
            request_id = %id,
            size_bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            encoder = self.encoder.name(),
            "artifact ready"
        );
        Ok(ArtifactHandle {
            id: record.id,
            size_bytes: record.size_bytes,
            resolution: request.resolution,
        })
    }

    async fn stage_and_encode(
        &self,
        id: &ArtifactId,
        paths: &StagedPaths,
        image: &[u8],
        audio: &[u8],
        resolution: crate::types::Resolution,
    ) -> Result<()> {
        tokio::fs::write(&paths.image, image).await?;
        tokio::fs::write(&paths.audio, audio).await?;

        self.encoder
            .encode(&EncodeJob {
                request_id: id.clone(),
                image_path: paths.image.clone(),
                audio_path: paths.audio.clone(),
                output_path: paths.output.clone(),
                resolution,
            })
            .await
            .map_err(Error::from)
    }
}

/// Discards a reservation whose run was dropped before finishing
///
/// Holds the identifier and every file the run may have created. Dropped
/// while armed, it spawns the deletion on the runtime it was created on.
struct AbandonGuard {
    store: Arc<ArtifactStore>,
    id: ArtifactId,
    files: Vec<PathBuf>,
    runtime: Option<Handle>,
    armed: bool,
}

impl AbandonGuard {
    fn new(store: Arc<ArtifactStore>, id: ArtifactId, output: PathBuf) -> Self {
        Self {
            store,
            id,
            files: vec![output],
            runtime: Handle::try_current().ok(),
            armed: true,
        }
    }

    fn track(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(runtime) = self.runtime.take() else {
            warn!(request_id = %self.id, "no runtime to clean up abandoned merge");
            return;
        };

        let store = self.store.clone();
        let id = self.id.clone();
        let files = std::mem::take(&mut self.files);
        warn!(request_id = %id, "merge abandoned before completion, discarding artifact");
        runtime.spawn(async move {
            store.delete(&id).await;
            for file in &files {
                utils::remove_file_logged(file).await;
            }
        });
    }
}
