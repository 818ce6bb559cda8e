//! External video encoder
//!
//! This module provides a trait-based seam around the tool that turns a still
//! image and an audio track into a video. The job runner only sees the
//! [`Encoder`] trait, so lifecycle logic can be tested without a real binary.
//!
//! ## Architecture
//!
//! - [`FfmpegEncoder`]: runs an external `ffmpeg` binary
//! - [`UnavailableEncoder`]: stand-in when no binary could be located; every
//!   encode fails with [`EncodeError::EncoderNotFound`](crate::error::EncodeError::EncoderNotFound)
//!
//! ## Usage
//!
//! ```no_run
//! use ffmerge::encoder::{EncodeJob, Encoder, FfmpegEncoder};
//! use ffmerge::types::{ArtifactId, Resolution};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let encoder = FfmpegEncoder::from_path().expect("ffmpeg binary not found");
//!
//!     encoder
//!         .encode(&EncodeJob {
//!             request_id: ArtifactId::from("req_1_example"),
//!             image_path: PathBuf::from("/tmp/cover.jpg"),
//!             audio_path: PathBuf::from("/tmp/audio.mp3"),
//!             output_path: PathBuf::from("/tmp/output.mp4"),
//!             resolution: Resolution::new(1280, 720),
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

mod diagnostics;
mod ffmpeg;
mod traits;
mod unavailable;

pub use diagnostics::{DIAGNOSTIC_TAIL_CHARS, DiagnosticTail, ProgressTracker, parse_progress_seconds};
pub use ffmpeg::FfmpegEncoder;
pub use traits::{EncodeJob, Encoder};
pub use unavailable::UnavailableEncoder;

use crate::config::EncoderConfig;
use std::sync::Arc;

/// Pick an encoder implementation for `config`
///
/// Falls back to [`UnavailableEncoder`] when no ffmpeg binary can be found, so
/// the service still starts and reports the problem per request.
pub fn from_config(config: &EncoderConfig) -> Arc<dyn Encoder> {
    match FfmpegEncoder::from_config(config) {
        Some(encoder) => {
            tracing::info!(binary = ?encoder.binary_path(), "using ffmpeg encoder");
            Arc::new(encoder)
        }
        None => {
            tracing::warn!(
                "ffmpeg not found; merge requests will fail until FFMPEG_PATH is set or ffmpeg is on PATH"
            );
            Arc::new(UnavailableEncoder::new(
                "ffmpeg binary not found; set FFMPEG_PATH or install ffmpeg on PATH",
            ))
        }
    }
}
