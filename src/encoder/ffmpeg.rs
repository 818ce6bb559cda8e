//! Encoder backed by an external ffmpeg binary

use super::diagnostics::{DiagnosticTail, ProgressTracker};
use super::traits::{EncodeJob, Encoder};
use crate::config::EncoderConfig;
use crate::error::EncodeError;
use crate::types::ArtifactId;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tracing::{debug, info, warn};

/// Encoder that shells out to `ffmpeg`
///
/// The still image is looped for the length of the audio, scaled down to fit
/// the requested frame and padded (letterboxed) to exactly that size. Video is
/// H.264 tuned for still images, audio is AAC, and the container is MP4 with
/// the index at the front so playback can start before the download ends.
///
/// # Examples
///
/// ```no_run
/// use ffmerge::encoder::{Encoder, FfmpegEncoder};
/// use std::path::PathBuf;
///
/// // Explicit binary
/// let encoder = FfmpegEncoder::new(PathBuf::from("/usr/bin/ffmpeg"));
///
/// // Or auto-discover from PATH
/// let encoder = FfmpegEncoder::from_path().expect("ffmpeg not found in PATH");
/// assert_eq!(encoder.name(), "ffmpeg");
/// ```
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary_path: PathBuf,
    preset: String,
    audio_bitrate: String,
    timeout: Option<Duration>,
}

impl FfmpegEncoder {
    /// Create an encoder for the binary at `binary_path` with default settings
    pub fn new(binary_path: PathBuf) -> Self {
        let defaults = EncoderConfig::default();
        Self {
            binary_path,
            preset: defaults.preset,
            audio_bitrate: defaults.audio_bitrate,
            timeout: defaults.timeout,
        }
    }

    /// Attempt to find ffmpeg in PATH
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Build from configuration
    ///
    /// An explicit `ffmpeg_path` is used as-is; otherwise PATH is searched when
    /// `search_path` is enabled. Returns `None` when no binary was found.
    pub fn from_config(config: &EncoderConfig) -> Option<Self> {
        let binary_path = match &config.ffmpeg_path {
            Some(path) => path.clone(),
            None if config.search_path => which::which("ffmpeg").ok()?,
            None => return None,
        };
        Some(Self {
            binary_path,
            preset: config.preset.clone(),
            audio_bitrate: config.audio_bitrate.clone(),
            timeout: config.timeout,
        })
    }

    /// Kill the encoder if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Location of the ffmpeg executable
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Command-line arguments for `job`
    pub fn build_args(&self, job: &EncodeJob) -> Vec<OsString> {
        let (w, h) = (job.resolution.width, job.resolution.height);
        let filter =
            format!("scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2");

        let mut args: Vec<OsString> = vec![
            "-loop".into(),
            "1".into(),
            "-i".into(),
            job.image_path.clone().into(),
            "-i".into(),
            job.audio_path.clone().into(),
        ];
        for arg in [
            "-c:v",
            "libx264",
            "-preset",
            self.preset.as_str(),
            "-tune",
            "stillimage",
            "-c:a",
            "aac",
            "-b:a",
            self.audio_bitrate.as_str(),
            "-pix_fmt",
            "yuv420p",
            "-vf",
            filter.as_str(),
            "-shortest",
            "-movflags",
            "+faststart",
            "-y",
        ] {
            args.push(arg.into());
        }
        args.push(job.output_path.clone().into_os_string());
        args
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn encode(&self, job: &EncodeJob) -> Result<(), EncodeError> {
        let args = self.build_args(job);
        debug!(
            request_id = %job.request_id,
            binary = ?self.binary_path,
            ?args,
            "starting ffmpeg"
        );

        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncodeError::EncoderNotFound(format!("{}: {e}", self.binary_path.display()))
                } else {
                    EncodeError::Process(format!("failed to start ffmpeg: {e}"))
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EncodeError::Process("ffmpeg stderr was not captured".into()))?;
        let reader = tokio::spawn(collect_diagnostics(stderr, job.request_id.clone()));

        let waited = match self.timeout {
            Some(limit) => {
                let bounded = tokio::time::timeout(limit, child.wait()).await;
                let Ok(waited) = bounded else {
                    if let Err(e) = child.kill().await {
                        warn!(request_id = %job.request_id, error = %e, "failed to kill timed out ffmpeg");
                    }
                    reader.abort();
                    return Err(EncodeError::TimedOut {
                        timeout_secs: limit.as_secs(),
                    });
                };
                waited
            }
            None => child.wait().await,
        };
        let status =
            waited.map_err(|e| EncodeError::Process(format!("failed to wait for ffmpeg: {e}")))?;

        // The pipe closes when the process exits, so the reader finishes promptly
        let tail = reader.await.unwrap_or_default();

        if status.success() {
            info!(request_id = %job.request_id, "ffmpeg finished");
            Ok(())
        } else {
            let exit_code = status.code().unwrap_or(-1);
            let diagnostic = tail.summary();
            warn!(request_id = %job.request_id, exit_code, %diagnostic, "ffmpeg failed");
            Err(EncodeError::Exit {
                exit_code,
                diagnostic,
            })
        }
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Drain ffmpeg's stderr, logging progress and keeping the tail
async fn collect_diagnostics(mut stderr: ChildStderr, request_id: ArtifactId) -> DiagnosticTail {
    let mut tail = DiagnosticTail::new();
    let mut progress = ProgressTracker::new();
    let mut buf = [0u8; 4096];

    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = &buf[..n];
                if let Some(position) = progress.observe(&String::from_utf8_lossy(chunk)) {
                    info!(request_id = %request_id, position_secs = position, "encoding progress");
                }
                tail.push(chunk);
            }
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "failed reading ffmpeg output");
                break;
            }
        }
    }
    tail
}
