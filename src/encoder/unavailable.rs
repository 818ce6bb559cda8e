//! Encoder stand-in used when no encoder binary is available

use super::traits::{EncodeJob, Encoder};
use crate::error::EncodeError;
use async_trait::async_trait;

/// Encoder that always fails with [`EncodeError::EncoderNotFound`]
///
/// # Examples
///
/// ```
/// use ffmerge::encoder::{EncodeJob, Encoder, UnavailableEncoder};
/// use ffmerge::types::{ArtifactId, Resolution};
/// use std::path::PathBuf;
///
/// # #[tokio::main]
/// # async fn main() {
/// let encoder = UnavailableEncoder::new("ffmpeg not installed");
/// let job = EncodeJob {
///     request_id: ArtifactId::from("req_1_a"),
///     image_path: PathBuf::from("cover.jpg"),
///     audio_path: PathBuf::from("audio.mp3"),
///     output_path: PathBuf::from("output.mp4"),
///     resolution: Resolution::default(),
/// };
/// assert!(encoder.encode(&job).await.is_err());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct UnavailableEncoder {
    reason: String,
}

impl UnavailableEncoder {
    /// Create a stand-in that reports `reason`
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Encoder for UnavailableEncoder {
    async fn encode(&self, _job: &EncodeJob) -> Result<(), EncodeError> {
        Err(EncodeError::EncoderNotFound(self.reason.clone()))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}
