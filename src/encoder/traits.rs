//! Traits and types for video encoding

use crate::error::EncodeError;
use crate::types::{ArtifactId, Resolution};
use async_trait::async_trait;
use std::path::PathBuf;

/// Everything an encoder needs for one merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeJob {
    /// Request this encode belongs to (for logging)
    pub request_id: ArtifactId,
    /// Staged still image
    pub image_path: PathBuf,
    /// Staged audio track
    pub audio_path: PathBuf,
    /// Where the video must be written
    pub output_path: PathBuf,
    /// Exact output frame size
    pub resolution: Resolution,
}

/// Turns a still image plus an audio track into a video file
///
/// Implementations must loop the image for the duration of the audio, scale
/// and letterbox it to exactly `resolution` while preserving aspect ratio,
/// and write a single interleaved container suitable for progressive
/// playback to `output_path`.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Run the encode; `Ok` means `output_path` holds the complete video
    async fn encode(&self, job: &EncodeJob) -> Result<(), EncodeError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
