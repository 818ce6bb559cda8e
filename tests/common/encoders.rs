//! Encoder stand-ins that need no ffmpeg binary

use async_trait::async_trait;
use ffmerge::{EncodeError, EncodeJob, Encoder};

/// Writes a deterministic file whose size depends on the frame size
///
/// `width * height / 8` bytes, so different resolutions give different sizes.
pub struct SizedEncoder;

impl SizedEncoder {
    /// Output size for a frame of `width` x `height`
    pub fn output_len(width: u32, height: u32) -> usize {
        (width as usize * height as usize) / 8
    }
}

#[async_trait]
impl Encoder for SizedEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<(), EncodeError> {
        if !job.image_path.exists() || !job.audio_path.exists() {
            return Err(EncodeError::Process("inputs were not staged".into()));
        }
        let len = Self::output_len(job.resolution.width, job.resolution.height);
        let contents: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&job.output_path, contents)
            .await
            .map_err(|e| EncodeError::Process(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "sized"
    }
}

/// Always fails like ffmpeg rejecting its input
pub struct RejectingEncoder;

#[async_trait]
impl Encoder for RejectingEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<(), EncodeError> {
        tokio::fs::write(&job.output_path, b"partial")
            .await
            .map_err(|e| EncodeError::Process(e.to_string()))?;
        Err(EncodeError::Exit {
            exit_code: 1,
            diagnostic: "Invalid data found when processing input".into(),
        })
    }

    fn name(&self) -> &'static str {
        "rejecting"
    }
}
