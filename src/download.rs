//! Single-use artifact downloads
//!
//! A download claims the artifact (`Ready → Downloading`), streams the file
//! and, once the stream is dropped for any reason, deletes the artifact after
//! a short grace delay. The sweeper never touches an artifact in transit.

use crate::artifact_store::ArtifactStore;
use crate::error::StoreError;
use crate::types::{ArtifactId, ArtifactRecord};
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Serves artifacts exactly once
#[derive(Clone)]
pub struct DownloadHandler {
    store: Arc<ArtifactStore>,
    grace_delay: Duration,
}

impl DownloadHandler {
    /// Create a handler that deletes artifacts `grace_delay` after transfer
    pub fn new(store: Arc<ArtifactStore>, grace_delay: Duration) -> Self {
        Self { store, grace_delay }
    }

    /// Claim `id` and open its file for streaming
    ///
    /// Fails with [`StoreError::NotFound`] for unknown, expired and pending
    /// identifiers alike, and with [`StoreError::AlreadyDownloading`] while
    /// another transfer of the same artifact is running.
    pub async fn serve(&self, id: &ArtifactId) -> Result<ArtifactDownload, StoreError> {
        let record = self.store.begin_download(id)?;
        // From here on every exit path ends in deletion
        let guard = DeletionGuard::new(self.store.clone(), id.clone(), self.grace_delay);

        let file = match tokio::fs::File::open(&record.path).await {
            Ok(file) => file,
            Err(e) => {
                warn!(artifact_id = %id, path = ?record.path, error = %e, "artifact file unreadable");
                guard.disarm();
                self.store.delete(id).await;
                return Err(StoreError::NotFound(id.clone()));
            }
        };
        let size_bytes = match file.metadata().await {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(artifact_id = %id, error = %e, "failed to stat artifact, using recorded size");
                record.size_bytes
            }
        };

        info!(artifact_id = %id, size_bytes, "download started");
        Ok(ArtifactDownload {
            record,
            size_bytes,
            stream: ArtifactStream {
                inner: ReaderStream::new(file),
                _guard: guard,
            },
        })
    }
}

/// An artifact claimed for download
pub struct ArtifactDownload {
    /// The record as it was when the download began
    pub record: ArtifactRecord,
    /// Exact number of bytes the stream will yield
    pub size_bytes: u64,
    stream: ArtifactStream,
}

impl ArtifactDownload {
    /// Take the body stream; dropping it schedules deletion
    pub fn into_stream(self) -> ArtifactStream {
        self.stream
    }
}

/// File contents in chunks
///
/// Owns the deletion guard, so the artifact is removed once the consumer is
/// done with the stream, whether it finished, failed or was abandoned.
pub struct ArtifactStream {
    inner: ReaderStream<tokio::fs::File>,
    _guard: DeletionGuard,
}

impl Stream for ArtifactStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

/// Deletes an artifact after a grace delay when dropped
struct DeletionGuard {
    store: Arc<ArtifactStore>,
    id: ArtifactId,
    grace_delay: Duration,
    runtime: Option<Handle>,
    armed: bool,
}

impl DeletionGuard {
    fn new(store: Arc<ArtifactStore>, id: ArtifactId, grace_delay: Duration) -> Self {
        Self {
            store,
            id,
            grace_delay,
            runtime: Handle::try_current().ok(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for DeletionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(runtime) = self.runtime.take() else {
            warn!(artifact_id = %self.id, "no runtime to schedule artifact deletion");
            return;
        };

        let store = self.store.clone();
        let id = self.id.clone();
        let grace_delay = self.grace_delay;
        debug!(artifact_id = %id, grace_ms = grace_delay.as_millis() as u64, "download finished, scheduling deletion");
        runtime.spawn(async move {
            tokio::time::sleep(grace_delay).await;
            store.delete(&id).await;
        });
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::types::ArtifactState;
    use futures::StreamExt;
    use tempfile::{TempDir, tempdir};

    fn setup(grace: Duration) -> (DownloadHandler, Arc<ArtifactStore>, TempDir) {
        let store = Arc::new(ArtifactStore::new(Arc::new(SystemClock)));
        (DownloadHandler::new(store.clone(), grace), store, tempdir().unwrap())
    }

    fn register(store: &ArtifactStore, dir: &TempDir, id: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(format!("output_{id}.mp4"));
        std::fs::write(&path, contents).unwrap();
        store
            .put(ArtifactRecord::new(
                ArtifactId::from(id),
                path.clone(),
                format!("video_{id}.mp4"),
                chrono::Utc::now(),
                contents.len() as u64,
            ))
            .unwrap();
        path
    }

    async fn collect(stream: ArtifactStream) -> Vec<u8> {
        let chunks: Vec<Bytes> = stream.map(|chunk| chunk.unwrap()).collect().await;
        chunks.concat()
    }

    #[tokio::test]
    async fn serves_file_then_deletes_after_grace() {
        let (handler, store, dir) = setup(Duration::from_millis(300));
        let contents = vec![42u8; 200_000];
        let path = register(&store, &dir, "req_1_dl", &contents);
        let id = ArtifactId::from("req_1_dl");

        let download = handler.serve(&id).await.unwrap();
        assert_eq!(download.size_bytes, 200_000);
        assert_eq!(download.record.display_name, "video_req_1_dl.mp4");
        assert_eq!(store.state(&id), Some(ArtifactState::Downloading));

        let body = collect(download.into_stream()).await;
        assert_eq!(body, contents);

        // Still present during the grace delay
        assert!(path.exists());
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert!(!path.exists());
        assert!(matches!(handler.serve(&id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn second_download_while_first_is_running_conflicts() {
        let (handler, store, dir) = setup(Duration::from_millis(10));
        register(&store, &dir, "req_1_busy", b"video");
        let id = ArtifactId::from("req_1_busy");

        let first = handler.serve(&id).await.unwrap();
        assert!(matches!(
            handler.serve(&id).await,
            Err(StoreError::AlreadyDownloading(_))
        ));
        drop(first);
    }

    #[tokio::test]
    async fn abandoned_download_still_deletes() {
        let (handler, store, dir) = setup(Duration::from_millis(10));
        let path = register(&store, &dir, "req_1_gone", &vec![1u8; 100_000]);
        let id = ArtifactId::from("req_1_gone");

        let mut stream = handler.serve(&id).await.unwrap().into_stream();
        // Client reads one chunk and disconnects
        stream.next().await.unwrap().unwrap();
        drop(stream);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!path.exists());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_not_found_and_forgotten() {
        let (handler, store, dir) = setup(Duration::from_millis(10));
        let path = register(&store, &dir, "req_1_lost", b"video");
        std::fs::remove_file(&path).unwrap();
        let id = ArtifactId::from("req_1_lost");

        assert!(matches!(handler.serve(&id).await, Err(StoreError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unknown_and_pending_ids_are_not_found() {
        let (handler, store, dir) = setup(Duration::from_millis(10));
        assert!(matches!(
            handler.serve(&ArtifactId::from("req_0_nope")).await,
            Err(StoreError::NotFound(_))
        ));

        let pending = ArtifactId::from("req_1_pending");
        store
            .reserve(&pending, dir.path().join("output_req_1_pending.mp4"), "v.mp4")
            .unwrap();
        assert!(matches!(handler.serve(&pending).await, Err(StoreError::NotFound(_))));
        assert_eq!(store.state(&pending), Some(ArtifactState::Pending));
    }
}
